//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A Python project in a git repository, ready for the release driver
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestProject {
  /// Create a committed project with matching version records
  pub fn new(version: &str) -> Result<Self> {
    Self::with_module_version(version, version)
  }

  /// Create a project whose pyproject and __version__ may disagree
  pub fn with_module_version(manifest_version: &str, module_version: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(
      path.join("pyproject.toml"),
      format!(
        r#"[project]
name = "storm-checker"
version = "{}"
description = "A test package"

[project.scripts]
stormcheck = "storm_checker.cli:main"
"#,
        manifest_version
      ),
    )?;

    std::fs::write(path.join("README.md"), "# storm-checker\n\nA test package.\n")?;

    std::fs::create_dir_all(path.join("storm_checker"))?;
    std::fs::write(
      path.join("storm_checker/__init__.py"),
      format!("\"\"\"Test package.\"\"\"\n\n__version__ = \"{}\"\n", module_version),
    )?;

    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial project setup"])?;

    Ok(Self { _root: root, path })
  }

  /// Commit current changes
  pub fn commit(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  /// Read a file relative to the project root
  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the pypilot binary; callers inspect status/output themselves since
/// several tests assert on failure modes
pub fn run_pypilot(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_pypilot");

  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run pypilot")
}
