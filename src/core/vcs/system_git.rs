//! System git backend - zero dependencies
//!
//! Uses system git for all version-control queries the pipeline needs:
//! HEAD/branch/cleanliness for preflight, tag discovery for the changelog
//! baseline, and annotated tag creation for release provenance. Subprocess
//! execution is isolated (cleared environment, whitelisted PATH/HOME).

use crate::core::error::{GitError, PilotError, PilotResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git backend using system git (zero crate dependencies)
pub struct SystemGit {
  /// Working tree root, resolved once at open
  repo_path: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  ///
  /// This performs ONE subprocess call to resolve the working tree root;
  /// every later query runs from there.
  pub fn open(path: &Path) -> PilotResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(PilotError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(PilotError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);

    Ok(Self {
      repo_path: PathBuf::from(stdout.trim()),
    })
  }

  /// Get abbreviated HEAD commit SHA (used in deployment records)
  pub fn short_head(&self) -> PilotResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--short", "HEAD"])
      .output()
      .context("Failed to get short HEAD commit")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(PilotError::Git(GitError::CommandFailed {
        command: "git rev-parse --short HEAD".to_string(),
        stderr: stderr.to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Get current branch name
  pub fn current_branch(&self) -> PilotResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Check whether the working tree has uncommitted changes
  pub fn is_dirty(&self) -> PilotResult<bool> {
    let output = self
      .git_cmd()
      .args(["status", "--porcelain"])
      .output()
      .context("Failed to get git status")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(PilotError::Git(GitError::CommandFailed {
        command: "git status --porcelain".to_string(),
        stderr: stderr.to_string(),
      }));
    }

    Ok(!output.stdout.is_empty())
  }

  /// Find the most recent tag reachable from HEAD
  ///
  /// Returns None when no tag exists yet (first release — a valid state,
  /// the changelog stage simply has no baseline to diff against).
  pub fn latest_tag(&self) -> PilotResult<Option<String>> {
    let output = self
      .git_cmd()
      .args(["describe", "--tags", "--abbrev=0"])
      .output()
      .context("Failed to run git describe")?;

    if !output.status.success() {
      return Ok(None);
    }

    let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(if tag.is_empty() { None } else { Some(tag) })
  }

  /// Get commit subject lines between `since_ref` and HEAD, newest first
  pub fn subjects_since(&self, since_ref: &str) -> PilotResult<Vec<String>> {
    let range = format!("{}..HEAD", since_ref);
    let output = self
      .git_cmd()
      .args(["log", "--no-merges", "--pretty=%s", &range])
      .output()
      .context("Failed to run git log")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(PilotError::Git(GitError::CommandFailed {
        command: format!("git log {}", range),
        stderr: stderr.to_string(),
      }));
    }

    let subjects = String::from_utf8_lossy(&output.stdout)
      .lines()
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect();

    Ok(subjects)
  }

  /// Create an annotated tag at HEAD
  pub fn create_annotated_tag(&self, name: &str, message: &str) -> PilotResult<()> {
    let output = self
      .git_cmd()
      .args(["tag", "-a", name, "-m", message])
      .output()
      .context("Failed to run git tag")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(PilotError::Git(GitError::CommandFailed {
        command: format!("git tag -a {}", name),
        stderr: stderr.to_string(),
      }));
    }

    Ok(())
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  /// - Adds safe configuration overrides
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    // Set working directory
    cmd.arg("-C").arg(&self.repo_path);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    // Force safe behavior (override user config)
    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false"); // Don't escape non-ASCII

    cmd
  }
}
