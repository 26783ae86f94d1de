//! The release pipeline: stage sequencing and gate policy
//!
//! Strictly sequential, single-threaded, stage-ordered:
//!
//! version records → registry/policy → test gate → changelog → build →
//! smoke test → upload → tag + deployment record
//!
//! Each stage advances the run, aborts it, or — under an explicit override —
//! records a warning and proceeds. The smoke test always runs before the
//! upload: a broken artifact must never reach the registry.

pub mod build;
pub mod changelog;
pub mod gate;
pub mod publish;
pub mod smoke;

use crate::core::context::{ProjectLayout, ReleaseContext};
use crate::core::error::{PilotError, PilotResult, ResultExt, VersionError};
use crate::core::vcs::SystemGit;
use crate::registry::{RegistryClient, RegistryQuery};
use crate::version::policy::{self, Resolution};
use crate::version::source::VersionSource;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Operator-facing flags, one per CLI switch
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  pub dry_run: bool,
  pub force: bool,
  pub skip_tests: bool,
  pub auto_version_bump: bool,
  pub sign: bool,
  pub assume_yes: bool,
  pub coverage_threshold: u32,
  pub json: bool,
}

/// Machine-readable summary of a completed run
#[derive(Debug, Serialize)]
struct ReleaseSummary {
  version: String,
  outcome: &'static str,
  artifacts: Vec<String>,
  coverage_pct: Option<u32>,
  warnings: Vec<String>,
}

/// Removes transient build output (build/, *.egg-info) on every termination
/// path of the run, successful or not.
struct BuildOutputGuard {
  root: std::path::PathBuf,
}

impl Drop for BuildOutputGuard {
  fn drop(&mut self) {
    let _ = std::fs::remove_dir_all(self.root.join("build"));
    if let Ok(entries) = std::fs::read_dir(&self.root) {
      for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "egg-info") {
          let _ = std::fs::remove_dir_all(&path);
        }
      }
    }
  }
}

/// Run the whole pipeline for the project in `root`
pub fn run(root: &Path, opts: RunOptions) -> PilotResult<()> {
  let layout = ProjectLayout::discover(root)?;
  let git = SystemGit::open(root)?;

  println!("📦 Releasing {} from {}", layout.package_name, layout.root.display());
  println!();

  let mut preflight_warnings = Vec::new();
  preflight(&git, &opts, &mut preflight_warnings)?;

  if !opts.dry_run {
    publish::check_credentials(&layout)?;
  }

  // Stage 1: version records must agree before anything else runs
  let source = VersionSource::new(&layout);
  let local = resolve_local_version(&source, &opts, &mut preflight_warnings)?;

  // Stage 2: reconcile against registry state
  let query = lookup_registry(&layout, &local, &mut preflight_warnings);
  let version = match policy::resolve(&local, query, opts.auto_version_bump) {
    Resolution::Unchanged(v) => v,
    Resolution::Bumped(v) => {
      // Persist through VersionSource so both records move together
      source.write_both(&v)?;
      println!("🔼 {} is already published; auto-bumped to {}", local, v);
      v
    }
    Resolution::Collision { current, suggested } => {
      return Err(PilotError::Version(VersionError::Collision {
        current: current.to_string(),
        suggested: suggested.to_string(),
      }));
    }
  };

  println!("🎯 Release version: {}", version);
  println!();

  let mut ctx = ReleaseContext::new(version);
  ctx.dry_run = opts.dry_run;
  ctx.force = opts.force;
  ctx.skip_tests = opts.skip_tests;
  ctx.auto_version_bump = opts.auto_version_bump;
  ctx.sign_release = opts.sign;
  ctx.assume_yes = opts.assume_yes;
  ctx.coverage_threshold = opts.coverage_threshold;
  ctx.warnings = preflight_warnings;

  // Transient build output is cleaned up on every exit path from here on
  let _guard = BuildOutputGuard {
    root: layout.root.clone(),
  };

  // Stage 3: test/coverage gate
  gate::run(&layout, &mut ctx)?;

  // Stage 4: changelog (idempotent; skipped without a baseline tag)
  changelog::sync(&layout, &git, &mut ctx)?;

  // Stage 5: build + validate + optional signing
  build::run(&layout, &mut ctx)?;

  // Stages 6 and 7: smoke test, then upload + provenance
  let outcome = ship(&layout, &git, &mut ctx)?;

  finish(&ctx, outcome, opts.json)?;
  Ok(())
}

/// Smoke-test the built wheel, then publish.
///
/// The order is the safety property of the whole pipeline: a wheel that
/// fails its local install check never reaches the upload path, so no
/// publish side effect (upload, tag, deployment record) can exist for it.
fn ship(layout: &ProjectLayout, git: &SystemGit, ctx: &mut ReleaseContext) -> PilotResult<publish::Outcome> {
  smoke::verify(layout, ctx)?;
  publish::run(layout, git, ctx)
}

/// Working-tree and branch checks. Only the dirty-tree check can stop the
/// run, and only by the operator declining the confirmation.
fn preflight(git: &SystemGit, opts: &RunOptions, warnings: &mut Vec<String>) -> PilotResult<()> {
  let branch = git.current_branch()?;
  if branch != "main" && branch != "master" {
    let warning = format!("Releasing from branch '{}' (not main)", branch);
    println!("⚠️  {}", warning);
    warnings.push(warning);
  }

  if git.is_dirty()? {
    if opts.force || opts.assume_yes {
      let warning = "Working tree has uncommitted changes".to_string();
      println!("⚠️  {}", warning);
      warnings.push(warning);
    } else {
      println!("⚠️  Working tree has uncommitted changes.");
      print!("   Release anyway? [y/N] ");
      std::io::stdout().flush().ok();

      let mut input = String::new();
      std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read confirmation")?;

      let input = input.trim().to_lowercase();
      if input != "y" && input != "yes" {
        return Err(PilotError::message("Aborted: commit or stash your changes first"));
      }
      warnings.push("Working tree has uncommitted changes (confirmed by operator)".to_string());
    }
  }

  Ok(())
}

/// Read both version records and enforce the equality invariant.
///
/// A missing module constant is repaired from the manifest (the manifest is
/// authoritative). A conflicting constant is only repaired under
/// --auto-version-bump; otherwise the run aborts naming both values.
fn resolve_local_version(
  source: &VersionSource,
  opts: &RunOptions,
  warnings: &mut Vec<String>,
) -> PilotResult<semver::Version> {
  let (manifest, module) = source.read()?;

  match module {
    Some(module) if module == manifest => Ok(manifest),
    Some(module) => {
      if !opts.auto_version_bump {
        return Err(PilotError::Version(VersionError::Mismatch {
          manifest: manifest.to_string(),
          module: module.to_string(),
        }));
      }
      let corrected = source.reconcile(&manifest)?;
      let warning = format!("__version__ was {}; reconciled to {}", module, corrected);
      println!("⚠️  {}", warning);
      warnings.push(warning);
      Ok(corrected)
    }
    None => {
      let corrected = source.reconcile(&manifest)?;
      let warning = format!("__version__ was missing; wrote {}", corrected);
      println!("⚠️  {}", warning);
      warnings.push(warning);
      Ok(corrected)
    }
  }
}

/// One best-effort registry read. An unreachable registry is never fatal —
/// first release from an offline machine is a valid state.
fn lookup_registry(layout: &ProjectLayout, version: &semver::Version, warnings: &mut Vec<String>) -> RegistryQuery {
  let client = match RegistryClient::new() {
    Ok(client) => client,
    Err(e) => {
      let warning = format!("Registry check skipped: {}", e);
      println!("⚠️  {}", warning);
      warnings.push(warning);
      return RegistryQuery::NotFound;
    }
  };

  match client.lookup(&layout.package_name, version) {
    Ok(query) => query,
    Err(e) => {
      let warning = format!("Registry check skipped: {}", e);
      println!("⚠️  {}", warning);
      warnings.push(warning);
      RegistryQuery::NotFound
    }
  }
}

/// Final summary: outcome, artifacts, and every warning gathered on the way
fn finish(ctx: &ReleaseContext, outcome: publish::Outcome, json: bool) -> PilotResult<()> {
  let outcome_str = match outcome {
    publish::Outcome::Published => "published",
    publish::Outcome::DryRun => "dry-run",
  };

  if json {
    let summary = ReleaseSummary {
      version: ctx.version.to_string(),
      outcome: outcome_str,
      artifacts: ctx.artifacts.iter().map(|a| a.file_name()).collect(),
      coverage_pct: ctx.coverage_pct,
      warnings: ctx.warnings.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  println!();
  match outcome {
    publish::Outcome::Published => println!("🎉 Released {} successfully!", ctx.version),
    publish::Outcome::DryRun => println!("✅ Dry run for {} complete (nothing uploaded)", ctx.version),
  }

  if !ctx.warnings.is_empty() {
    println!();
    println!("Warnings ({}):", ctx.warnings.len());
    for warning in &ctx.warnings {
      println!("  ⚠️  {}", warning);
    }
  }

  Ok(())
}
