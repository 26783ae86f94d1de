//! Upload, post-upload verification, and release provenance
//!
//! Uploads the validated artifacts with twine; upload failure is fatal with
//! no retry — the operator must diagnose and rerun. After a successful
//! upload the registry is eventually consistent, so availability is polled
//! by installing the exact published version (bounded attempts, fixed
//! delay); exhausting the budget is a warning, not a failure, since the
//! upload itself already succeeded. Provenance: an annotated `v<version>`
//! tag and an append-only deployment record, both written only for real
//! (non-dry-run) publishes. Provenance failures are warnings, never aborts.

use crate::core::context::{ProjectLayout, ReleaseContext};
use crate::core::error::{PilotError, PilotResult, PublishError, ResultExt};
use crate::core::retry::{real_sleep, Backoff};
use crate::core::vcs::SystemGit;
use crate::pipeline::smoke::EphemeralEnv;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Availability poll budget: 5 attempts, 30 seconds apart
pub const VERIFY_BACKOFF: Backoff = Backoff::new(5, Duration::from_secs(30));

/// How the publish stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// Artifacts uploaded to the registry
  Published,
  /// Dry run: no network mutation performed
  DryRun,
}

/// Registry credentials must exist before any network stage runs.
///
/// Either a PYPI_TOKEN in the environment or a ~/.pypirc file satisfies the
/// check; neither being present is fatal.
pub fn check_credentials(layout: &ProjectLayout) -> PilotResult<()> {
  if std::env::var("PYPI_TOKEN").is_ok() {
    return Ok(());
  }

  let pypirc = layout.credentials_path();
  if pypirc.exists() {
    return Ok(());
  }

  Err(PilotError::Publish(PublishError::MissingCredentials { path: pypirc }))
}

/// Upload the artifacts and run the post-upload steps
pub fn run(layout: &ProjectLayout, git: &SystemGit, ctx: &mut ReleaseContext) -> PilotResult<Outcome> {
  if ctx.dry_run {
    println!("🔍 Dry-run: would upload {} artifact(s) to the registry:", ctx.artifacts.len());
    for artifact in &ctx.artifacts {
      println!("   would deploy {}", artifact.file_name());
    }
    return Ok(Outcome::DryRun);
  }

  upload(layout, ctx)?;

  let available = verify_availability(VERIFY_BACKOFF, real_sleep, |attempt| {
    println!(
      "   ⏳ Availability check {}/{} for {}=={}",
      attempt, VERIFY_BACKOFF.max_attempts, layout.package_name, ctx.version
    );
    probe_install(layout, ctx)
  });

  if available {
    println!("✅ {}=={} is installable from the registry", layout.package_name, ctx.version);
  } else {
    ctx.warn(format!(
      "Registry has not served {}=={} yet after {} attempts; it usually appears within a few minutes",
      layout.package_name, ctx.version, VERIFY_BACKOFF.max_attempts
    ));
  }

  record_provenance(layout, git, ctx);

  Ok(Outcome::Published)
}

/// Release tag plus deployment record. Provenance is convenience metadata:
/// once the upload has succeeded, nothing here may abort the run, so both
/// failure modes downgrade to warnings.
fn record_provenance(layout: &ProjectLayout, git: &SystemGit, ctx: &mut ReleaseContext) {
  if let Err(e) = create_release_tag(git, ctx) {
    ctx.warn(format!("Could not create tag v{}: {}", ctx.version, e));
  }

  if let Err(e) = record_deployment(&layout.deploy_log, ctx, git) {
    ctx.warn(format!(
      "Could not record deployment in {}: {}",
      layout.deploy_log.display(),
      e
    ));
  }
}

/// Upload all artifacts (and any detached signatures) in one twine call.
/// No retry: a failed upload needs an operator, not a loop.
fn upload(layout: &ProjectLayout, ctx: &ReleaseContext) -> PilotResult<()> {
  println!("🚀 Uploading {} artifact(s) to the registry...", ctx.artifacts.len());

  let mut cmd = Command::new("python");
  cmd.current_dir(&layout.root).args(["-m", "twine", "upload"]);

  if let Ok(token) = std::env::var("PYPI_TOKEN") {
    cmd.args(["--username", "__token__", "--password", &token]);
  }

  for artifact in &ctx.artifacts {
    cmd.arg(&artifact.path);
    let signature = artifact.path.with_extension(format!(
      "{}.asc",
      artifact.path.extension().unwrap_or_default().to_string_lossy()
    ));
    if signature.exists() {
      cmd.arg(signature);
    }
  }

  let output = cmd.output().context("Failed to execute twine upload")?;

  if !output.status.success() {
    return Err(PilotError::Publish(PublishError::UploadFailed {
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }));
  }

  println!("✅ Upload complete");
  Ok(())
}

/// Poll until one probe succeeds or the budget is exhausted.
///
/// Decoupled from the real registry and clock so the loop itself is
/// testable: the probe and sleep functions are injected.
pub fn verify_availability(backoff: Backoff, sleep: impl FnMut(Duration), mut probe: impl FnMut(u32) -> bool) -> bool {
  backoff
    .run(sleep, |attempt| if probe(attempt) { Ok(()) } else { Err(()) })
    .is_ok()
}

/// One availability probe: install the exact version into a fresh env and,
/// when it lands, re-run the CLI health check against the registry copy
fn probe_install(layout: &ProjectLayout, ctx: &ReleaseContext) -> bool {
  let Ok(env) = EphemeralEnv::create() else {
    return false;
  };

  let spec = format!("{}=={}", layout.package_name, ctx.version);
  match env.pip_install(&spec, &["--only-binary", ":all:"]) {
    Ok(output) if output.status.success() => {
      if let Some(cli) = &layout.cli_name {
        return env.run_script(cli, &["--help"]).unwrap_or(false);
      }
      true
    }
    _ => false,
  }
}

/// Annotated v<version> tag summarizing the commits since the previous tag
fn create_release_tag(git: &SystemGit, ctx: &ReleaseContext) -> PilotResult<()> {
  let name = format!("v{}", ctx.version);
  let message = match git.latest_tag()? {
    Some(previous) => {
      let subjects = git.subjects_since(&previous)?;
      let mut message = format!("Release {} ({} commit(s) since {})\n", name, subjects.len(), previous);
      for subject in subjects.iter().take(20) {
        message.push_str(&format!("\n- {}", subject));
      }
      message
    }
    None => format!("Release {}", name),
  };

  git.create_annotated_tag(&name, &message)?;
  println!("🏷️  Created tag {}", name);
  Ok(())
}

/// Append `version|timestamp|short-sha` to the deployment history
fn record_deployment(deploy_log: &Path, ctx: &ReleaseContext, git: &SystemGit) -> PilotResult<()> {
  let commit = git.short_head()?;
  let line = format_record(&ctx.version.to_string(), Utc::now(), &commit);

  if let Some(parent) = deploy_log.parent() {
    std::fs::create_dir_all(parent).context("Failed to create deployment log directory")?;
  }

  // Append-only: existing history is never rewritten
  let mut file = std::fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(deploy_log)
    .context("Failed to open deployment log")?;
  file.write_all(line.as_bytes()).context("Failed to write deployment log")?;

  println!("🧾 Recorded deployment in {}", deploy_log.display());
  Ok(())
}

/// One line per completed release, pipe-separated, newline-terminated
pub fn format_record(version: &str, timestamp: DateTime<Utc>, commit: &str) -> String {
  format!("{}|{}|{}\n", version, timestamp.format("%Y-%m-%dT%H:%M:%SZ"), commit)
}
