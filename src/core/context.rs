//! Release context and project layout - build once, thread through the pipeline
//!
//! `ProjectLayout` is the read-only view of the project on disk (paths and
//! names derived from pyproject.toml). `ReleaseContext` is the single mutable
//! state owned by the orchestrator for the lifetime of one run: the resolved
//! version, the operator's flags, and the status each stage accumulates.

use crate::core::error::{PilotError, PilotResult, ResultExt, VersionError};
use semver::Version;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Kind of built distributable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
  Wheel,
  SourceArchive,
}

/// A built distributable with its registry-facing identity
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
  pub kind: ArtifactKind,
  pub path: PathBuf,
}

impl Artifact {
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default()
  }

  /// Whether the artifact filename embeds the given release version.
  ///
  /// Wheel and sdist filenames both carry the version as the second
  /// dash-separated field: `pkg-1.2.3-py3-none-any.whl`, `pkg-1.2.3.tar.gz`.
  pub fn embeds_version(&self, version: &Version) -> bool {
    let name = self.file_name();
    let mut fields = name.split('-');
    let _pkg = fields.next();
    match fields.next() {
      Some(field) => {
        let field = field.strip_suffix(".tar.gz").unwrap_or(field);
        field == version.to_string()
      }
      None => false,
    }
  }
}

/// Project layout discovered from the working directory.
///
/// Paths are absolute. Names come from the `[project]` table of
/// pyproject.toml; the importable module name is the package name with
/// dashes folded to underscores (the packaging convention).
#[derive(Debug, Clone)]
pub struct ProjectLayout {
  /// Project root (where pyproject.toml lives)
  pub root: PathBuf,

  /// Registry-facing package name
  pub package_name: String,

  /// Importable top-level module name
  pub module_name: String,

  /// CLI entry point from [project.scripts], if any
  pub cli_name: Option<String>,

  /// pyproject.toml (authoritative version record #1)
  pub pyproject: PathBuf,

  /// Module file carrying __version__ (authoritative version record #2)
  pub module_init: PathBuf,

  /// Changelog, when the project keeps one
  pub changelog: Option<PathBuf>,

  /// Build output directory
  pub dist_dir: PathBuf,

  /// Append-only deployment history
  pub deploy_log: PathBuf,
}

impl ProjectLayout {
  /// Discover the project layout from a root directory.
  ///
  /// Fails when a required file (pyproject.toml, README, the module
  /// __version__ file) is absent. The changelog is optional; its absence
  /// just disables the sync stage.
  pub fn discover(root: &Path) -> PilotResult<Self> {
    let root = root.to_path_buf();

    let pyproject = root.join("pyproject.toml");
    if !pyproject.exists() {
      return Err(PilotError::Version(VersionError::MissingFile { path: pyproject }));
    }

    let readme = root.join("README.md");
    if !readme.exists() {
      return Err(PilotError::with_help(
        format!("Required file not found: {}", readme.display()),
        "The registry rejects packages without a README. Create README.md first.",
      ));
    }

    let (package_name, cli_name) = read_project_table(&pyproject)?;
    let module_name = package_name.replace('-', "_");

    // Flat layout first, src layout second
    let module_init = [
      root.join(&module_name).join("__init__.py"),
      root.join("src").join(&module_name).join("__init__.py"),
    ]
    .into_iter()
    .find(|p| p.exists())
    .ok_or_else(|| {
      PilotError::Version(VersionError::MissingFile {
        path: root.join(&module_name).join("__init__.py"),
      })
    })?;

    let changelog_path = root.join("CHANGELOG.md");
    let changelog = changelog_path.exists().then_some(changelog_path);

    Ok(Self {
      package_name,
      module_name,
      cli_name,
      pyproject,
      module_init,
      changelog,
      dist_dir: root.join("dist"),
      deploy_log: root.join(".pypilot").join("deployments.log"),
      root,
    })
  }

  /// Location of the registry credentials file
  pub fn credentials_path(&self) -> PathBuf {
    std::env::var_os("HOME")
      .map(PathBuf::from)
      .unwrap_or_default()
      .join(".pypirc")
  }
}

/// Read package name and CLI entry point from the [project] table
fn read_project_table(pyproject: &Path) -> PilotResult<(String, Option<String>)> {
  let content =
    std::fs::read_to_string(pyproject).with_context(|| format!("Failed to read {}", pyproject.display()))?;
  let doc: toml_edit::DocumentMut = content.parse()?;

  let project = doc
    .get("project")
    .and_then(|p| p.as_table())
    .ok_or_else(|| PilotError::message("No [project] table in pyproject.toml"))?;

  let name = project
    .get("name")
    .and_then(|n| n.as_str())
    .ok_or_else(|| PilotError::message("No `name` field in [project] table of pyproject.toml"))?
    .to_string();

  let cli_name = project
    .get("scripts")
    .and_then(|s| s.as_table_like())
    .and_then(|t| t.iter().next())
    .map(|(key, _)| key.to_string());

  Ok((name, cli_name))
}

/// The single mutable state threaded through the pipeline.
///
/// Owned exclusively by the orchestrator for one invocation; stages receive
/// it by mutable reference and record their outcomes here.
#[derive(Debug)]
pub struct ReleaseContext {
  /// Version being released (resolved by the version policy, then immutable)
  pub version: Version,

  pub dry_run: bool,
  pub force: bool,
  pub auto_version_bump: bool,
  pub sign_release: bool,
  pub skip_tests: bool,
  /// Skip interactive confirmations (dirty working tree)
  pub assume_yes: bool,

  /// Minimum acceptable coverage percentage when coverage data exists
  pub coverage_threshold: u32,

  /// Test gate verdict (None until the gate runs; false only under --force)
  pub tests_passed: Option<bool>,

  /// Measured coverage, when a report was found
  pub coverage_pct: Option<u32>,

  /// Built artifacts, in build order
  pub artifacts: Vec<Artifact>,

  /// Non-fatal findings, replayed in the final summary
  pub warnings: Vec<String>,
}

impl ReleaseContext {
  pub fn new(version: Version) -> Self {
    Self {
      version,
      dry_run: false,
      force: false,
      auto_version_bump: false,
      sign_release: false,
      skip_tests: false,
      assume_yes: false,
      coverage_threshold: 80,
      tests_passed: None,
      coverage_pct: None,
      artifacts: Vec::new(),
      warnings: Vec::new(),
    }
  }

  /// Record a warning and surface it immediately
  pub fn warn(&mut self, message: impl Into<String>) {
    let message = message.into();
    println!("⚠️  {}", message);
    self.warnings.push(message);
  }

  /// The wheel among the built artifacts, if the build stage ran
  pub fn wheel(&self) -> Option<&Artifact> {
    self.artifacts.iter().find(|a| a.kind == ArtifactKind::Wheel)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_artifact_embeds_version() {
    let v: Version = "1.2.3".parse().unwrap();
    let wheel = Artifact {
      kind: ArtifactKind::Wheel,
      path: PathBuf::from("dist/storm_checker-1.2.3-py3-none-any.whl"),
    };
    let sdist = Artifact {
      kind: ArtifactKind::SourceArchive,
      path: PathBuf::from("dist/storm_checker-1.2.3.tar.gz"),
    };
    assert!(wheel.embeds_version(&v));
    assert!(sdist.embeds_version(&v));
    assert!(!wheel.embeds_version(&"1.2.4".parse().unwrap()));
  }

  #[test]
  fn test_artifact_embeds_version_rejects_garbage() {
    let v: Version = "1.2.3".parse().unwrap();
    let odd = Artifact {
      kind: ArtifactKind::Wheel,
      path: PathBuf::from("dist/nodash.whl"),
    };
    assert!(!odd.embeds_version(&v));
  }

  #[test]
  fn test_warn_accumulates() {
    let mut ctx = ReleaseContext::new("0.1.0".parse().unwrap());
    ctx.warn("first");
    ctx.warn("second");
    assert_eq!(ctx.warnings, vec!["first".to_string(), "second".to_string()]);
  }

  #[test]
  fn test_discover_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(
      root.join("pyproject.toml"),
      r#"[project]
name = "storm-checker"
version = "0.1.0"

[project.scripts]
stormcheck = "storm_checker.cli:main"
"#,
    )
    .unwrap();
    std::fs::write(root.join("README.md"), "# storm-checker\n").unwrap();
    std::fs::create_dir_all(root.join("storm_checker")).unwrap();
    std::fs::write(root.join("storm_checker/__init__.py"), "__version__ = \"0.1.0\"\n").unwrap();

    let layout = ProjectLayout::discover(root).unwrap();
    assert_eq!(layout.package_name, "storm-checker");
    assert_eq!(layout.module_name, "storm_checker");
    assert_eq!(layout.cli_name.as_deref(), Some("stormcheck"));
    assert!(layout.changelog.is_none());
  }

  #[test]
  fn test_discover_requires_pyproject() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProjectLayout::discover(dir.path()).unwrap_err();
    assert!(matches!(err, PilotError::Version(VersionError::MissingFile { .. })));
  }

  #[test]
  fn test_discover_requires_readme() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"x\"\n").unwrap();
    let err = ProjectLayout::discover(dir.path()).unwrap_err();
    assert!(err.to_string().contains("README"));
  }
}
