//! Error types for pypilot with contextual messages and exit codes
//!
//! This module provides a unified error type that categorizes errors and provides
//! contextual help messages to users. The guiding rule: anything that could
//! silently publish a broken or duplicate artifact is fatal; anything that only
//! affects provenance or convenience metadata is downgraded to a warning by the
//! pipeline and never reaches this module.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for pypilot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (missing files, invalid args, missing credentials)
  User = 1,
  /// System error (git, subprocess, network, I/O)
  System = 2,
  /// Validation failure (version invariants, gates, artifact checks)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for pypilot
#[derive(Debug)]
pub enum PilotError {
  /// Version record errors (missing files, mismatch, collision)
  Version(VersionError),

  /// Git operation errors
  Git(GitError),

  /// Test/coverage gate errors
  Gate(GateError),

  /// Artifact build and validation errors
  Build(BuildError),

  /// Upload and post-upload errors
  Publish(PublishError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PilotError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PilotError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PilotError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PilotError::Message { message, context, help } => PilotError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PilotError::Version(_) => ExitCode::Validation,
      PilotError::Git(_) => ExitCode::System,
      PilotError::Gate(_) => ExitCode::Validation,
      PilotError::Build(_) => ExitCode::Validation,
      PilotError::Publish(_) => ExitCode::System,
      PilotError::Io(_) => ExitCode::System,
      PilotError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PilotError::Version(e) => e.help_message(),
      PilotError::Git(e) => e.help_message(),
      PilotError::Gate(e) => e.help_message(),
      PilotError::Build(e) => e.help_message(),
      PilotError::Publish(e) => e.help_message(),
      PilotError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for PilotError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PilotError::Version(e) => write!(f, "{}", e),
      PilotError::Git(e) => write!(f, "{}", e),
      PilotError::Gate(e) => write!(f, "{}", e),
      PilotError::Build(e) => write!(f, "{}", e),
      PilotError::Publish(e) => write!(f, "{}", e),
      PilotError::Io(e) => write!(f, "I/O error: {}", e),
      PilotError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PilotError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PilotError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for PilotError {
  fn from(err: io::Error) -> Self {
    PilotError::Io(err)
  }
}

impl From<String> for PilotError {
  fn from(msg: String) -> Self {
    PilotError::message(msg)
  }
}

impl From<&str> for PilotError {
  fn from(msg: &str) -> Self {
    PilotError::message(msg)
  }
}

impl From<toml_edit::TomlError> for PilotError {
  fn from(err: toml_edit::TomlError) -> Self {
    PilotError::message(format!("TOML parse error: {}", err))
  }
}

impl From<serde_json::Error> for PilotError {
  fn from(err: serde_json::Error) -> Self {
    PilotError::message(format!("JSON error: {}", err))
  }
}

impl From<semver::Error> for PilotError {
  fn from(err: semver::Error) -> Self {
    PilotError::message(format!("Version parse error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for PilotError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    PilotError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Convert anyhow::Error to PilotError (integration-test plumbing)
impl From<anyhow::Error> for PilotError {
  fn from(err: anyhow::Error) -> Self {
    PilotError::message(err.to_string())
  }
}

/// Version record errors
#[derive(Debug)]
pub enum VersionError {
  /// A required version record file is absent
  MissingFile { path: PathBuf },

  /// pyproject.toml and module __version__ disagree
  Mismatch { manifest: String, module: String },

  /// The version to release already exists on the registry
  Collision { current: String, suggested: String },

  /// A version record exists but the version field/constant is absent or unparseable
  Unreadable { path: PathBuf, reason: String },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::Mismatch { manifest, .. } => Some(format!(
        "Set __version__ = \"{}\" in the module, or re-run with --auto-version-bump to reconcile.",
        manifest
      )),
      VersionError::Collision { suggested, .. } => Some(format!(
        "Bump to {} (or re-run with --auto-version-bump to do it automatically).",
        suggested
      )),
      _ => None,
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::MissingFile { path } => {
        write!(f, "Required version record not found: {}", path.display())
      }
      VersionError::Mismatch { manifest, module } => {
        write!(
          f,
          "Version records disagree: pyproject.toml says {} but __version__ says {}",
          manifest, module
        )
      }
      VersionError::Collision { current, suggested } => {
        write!(
          f,
          "Version {} is already published on the registry (next patch would be {})",
          current, suggested
        )
      }
      VersionError::Unreadable { path, reason } => {
        write!(f, "Could not read version from {}: {}", path.display(), reason)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::RepoNotFound { path } => Some(format!(
        "Run pypilot from inside the project repository: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
    }
  }
}

/// Test/coverage gate errors
#[derive(Debug)]
pub enum GateError {
  /// The test runner reported failures
  TestsFailed { detail: String },

  /// Coverage data exists and is below the configured threshold
  CoverageBelowThreshold { actual: u32, threshold: u32 },
}

impl GateError {
  fn help_message(&self) -> Option<String> {
    match self {
      GateError::TestsFailed { .. } => {
        Some("Fix the failing tests, or re-run with --force to release anyway (not recommended).".to_string())
      }
      GateError::CoverageBelowThreshold { threshold, .. } => Some(format!(
        "Add tests to reach {}%, lower --coverage-threshold, or re-run with --force.",
        threshold
      )),
    }
  }
}

impl fmt::Display for GateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GateError::TestsFailed { detail } => {
        write!(f, "Test gate failed: {}", detail)
      }
      GateError::CoverageBelowThreshold { actual, threshold } => {
        write!(f, "Coverage {}% is below the {}% threshold", actual, threshold)
      }
    }
  }
}

/// Artifact build and validation errors
#[derive(Debug)]
pub enum BuildError {
  /// The build backend exited non-zero
  BackendFailed { stderr: String },

  /// No wheel was produced in the output directory
  MissingWheel,

  /// The expected source archive is absent
  MissingSdist { expected: String },

  /// An artifact embeds a version other than the one being released
  VersionEmbedding { artifact: String, expected: String },

  /// The registry-format validator rejected one or more artifacts
  ValidatorFailed { detail: String },

  /// Signing was requested and the signing tool failed
  SigningFailed { artifact: String, stderr: String },
}

impl BuildError {
  fn help_message(&self) -> Option<String> {
    match self {
      BuildError::BackendFailed { .. } => {
        Some("Check that the `build` package is installed: python -m pip install build".to_string())
      }
      BuildError::ValidatorFailed { .. } => {
        Some("Run `twine check dist/*` manually for the full report.".to_string())
      }
      BuildError::SigningFailed { .. } => {
        Some("Check your GPG key setup, or drop --sign to release unsigned.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::BackendFailed { stderr } => {
        write!(f, "Build backend failed:\n{}", stderr)
      }
      BuildError::MissingWheel => {
        write!(f, "Build produced no wheel artifact")
      }
      BuildError::MissingSdist { expected } => {
        write!(f, "Expected source archive not found: {}", expected)
      }
      BuildError::VersionEmbedding { artifact, expected } => {
        write!(f, "Artifact {} does not embed release version {}", artifact, expected)
      }
      BuildError::ValidatorFailed { detail } => {
        write!(f, "Artifact validation failed:\n{}", detail)
      }
      BuildError::SigningFailed { artifact, stderr } => {
        write!(f, "Failed to sign {}:\n{}", artifact, stderr)
      }
    }
  }
}

/// Upload and post-upload errors
#[derive(Debug)]
pub enum PublishError {
  /// Registry credentials are missing
  MissingCredentials { path: PathBuf },

  /// The upload tool exited non-zero (no retry; operator must diagnose)
  UploadFailed { stderr: String },

  /// The freshly built artifact failed the pre-upload smoke test
  SmokeTestFailed { detail: String },
}

impl PublishError {
  fn help_message(&self) -> Option<String> {
    match self {
      PublishError::MissingCredentials { path } => Some(format!(
        "Create {} with your registry token, or export PYPI_TOKEN.",
        path.display()
      )),
      PublishError::UploadFailed { .. } => Some(
        "Nothing was retried. Check the registry status, fix the cause, and re-run; \
         already-uploaded files are rejected as duplicates, which is safe."
          .to_string(),
      ),
      PublishError::SmokeTestFailed { .. } => {
        Some("The broken artifact was NOT uploaded. Inspect dist/ and the build configuration.".to_string())
      }
    }
  }
}

impl fmt::Display for PublishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PublishError::MissingCredentials { path } => {
        write!(f, "No registry credentials found (expected {})", path.display())
      }
      PublishError::UploadFailed { stderr } => {
        write!(f, "Upload to registry failed:\n{}", stderr)
      }
      PublishError::SmokeTestFailed { detail } => {
        write!(f, "Local install smoke test failed: {}", detail)
      }
    }
  }
}

/// Result type alias for pypilot
pub type PilotResult<T> = Result<T, PilotError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PilotResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PilotResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PilotError>,
{
  fn context(self, ctx: impl Into<String>) -> PilotResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PilotResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PilotError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
