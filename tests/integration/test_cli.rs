//! CLI-level tests: argument handling, layout discovery, and the failure
//! modes that must abort before any network or build tooling is touched

use crate::helpers::{run_pypilot, TestProject};
use anyhow::Result;

#[test]
fn test_help_lists_pipeline_flags() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  let output = run_pypilot(&project.path, &["--help"])?;

  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("--dry-run"));
  assert!(stdout.contains("--auto-version-bump"));
  assert!(stdout.contains("--coverage-threshold"));
  assert!(stdout.contains("--skip-tests"));
  Ok(())
}

#[test]
fn test_version_flag() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  let output = run_pypilot(&project.path, &["--version"])?;

  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("pypilot"));
  Ok(())
}

#[test]
fn test_missing_pyproject_is_a_validation_error() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  std::fs::remove_file(project.path.join("pyproject.toml"))?;

  let output = run_pypilot(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("pyproject.toml"));
  Ok(())
}

#[test]
fn test_missing_readme_is_rejected_with_help() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  std::fs::remove_file(project.path.join("README.md"))?;

  let output = run_pypilot(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("README"));
  Ok(())
}

#[test]
fn test_missing_module_version_file_is_rejected() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  std::fs::remove_file(project.path.join("storm_checker/__init__.py"))?;

  let output = run_pypilot(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("__init__.py"));
  Ok(())
}

#[test]
fn test_version_mismatch_aborts_naming_both_values() -> Result<()> {
  let project = TestProject::with_module_version("1.2.3", "1.2.2")?;

  let output = run_pypilot(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("1.2.3"));
  assert!(stderr.contains("1.2.2"));
  // The help text points at the reconcile flag
  assert!(stderr.contains("--auto-version-bump"));
  Ok(())
}

#[test]
fn test_mismatch_leaves_version_records_untouched() -> Result<()> {
  let project = TestProject::with_module_version("1.2.3", "1.2.2")?;

  let _ = run_pypilot(&project.path, &["--dry-run"])?;

  assert!(project.read_file("pyproject.toml")?.contains("version = \"1.2.3\""));
  assert!(project.read_file("storm_checker/__init__.py")?.contains("__version__ = \"1.2.2\""));
  Ok(())
}

#[test]
fn test_outside_a_git_repository_is_a_system_error() -> Result<()> {
  let dir = tempfile::tempdir()?;
  let root = dir.path();
  std::fs::write(
    root.join("pyproject.toml"),
    "[project]\nname = \"storm-checker\"\nversion = \"0.1.0\"\n",
  )?;
  std::fs::write(root.join("README.md"), "# storm-checker\n")?;
  std::fs::create_dir_all(root.join("storm_checker"))?;
  std::fs::write(root.join("storm_checker/__init__.py"), "__version__ = \"0.1.0\"\n")?;

  let output = run_pypilot(root, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(2));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("repository"));
  Ok(())
}

#[test]
fn test_dirty_tree_aborts_when_confirmation_is_declined() -> Result<()> {
  let project = TestProject::new("0.1.0")?;
  std::fs::write(project.path.join("storm_checker/extra.py"), "x = 1\n")?;
  project.commit("Add extra module")?;
  std::fs::write(project.path.join("storm_checker/extra.py"), "x = 2\n")?;

  // stdin is closed, so the [y/N] prompt reads an empty answer
  let output = run_pypilot(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Aborted"));
  Ok(())
}
