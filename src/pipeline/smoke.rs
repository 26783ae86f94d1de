//! Pre-publish install smoke test in an ephemeral environment
//!
//! The core safety property of the pipeline: a broken artifact must never
//! reach the registry, so this stage runs strictly before any upload. The
//! freshly built wheel is installed into a throwaway venv and two checks run
//! against it: the top-level module imports and reports the release version,
//! and the CLI entry point answers --help. The venv lives in a TempDir, so
//! teardown is unconditional on every exit path.

use crate::core::context::{ProjectLayout, ReleaseContext};
use crate::core::error::{PilotError, PilotResult, PublishError, ResultExt};
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A throwaway, isolated install target (venv inside a TempDir).
///
/// Dropping the value removes the whole environment.
pub struct EphemeralEnv {
  _dir: TempDir,
  bin_dir: PathBuf,
}

impl EphemeralEnv {
  /// Provision a fresh venv
  pub fn create() -> PilotResult<Self> {
    let dir = TempDir::new().context("Failed to create temp directory for venv")?;
    let venv = dir.path().join("venv");

    let output = Command::new("python")
      .args(["-m", "venv"])
      .arg(&venv)
      .output()
      .context("Failed to execute python -m venv")?;

    if !output.status.success() {
      return Err(PilotError::message(format!(
        "Failed to create venv:\n{}",
        String::from_utf8_lossy(&output.stderr)
      )));
    }

    let bin_dir = if cfg!(target_os = "windows") {
      venv.join("Scripts")
    } else {
      venv.join("bin")
    };

    Ok(Self { _dir: dir, bin_dir })
  }

  /// Install into the env via its own pip. `target` is a wheel path or a
  /// `name==version` spec; extra args are passed through.
  pub fn pip_install(&self, target: &str, extra_args: &[&str]) -> PilotResult<std::process::Output> {
    let mut cmd = Command::new(self.bin_dir.join("pip"));
    cmd.args(["install", "--quiet", "--no-cache-dir"]);
    cmd.args(extra_args);
    cmd.arg(target);

    cmd.output().context("Failed to execute pip install")
  }

  /// Run a snippet under the env's interpreter, returning trimmed stdout
  pub fn python_eval(&self, code: &str) -> PilotResult<String> {
    let output = Command::new(self.bin_dir.join("python"))
      .args(["-c", code])
      .output()
      .context("Failed to execute python")?;

    if !output.status.success() {
      return Err(PilotError::message(format!(
        "python -c failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
      )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Run an installed console script; Ok(true) when it exits zero
  pub fn run_script(&self, name: &str, args: &[&str]) -> PilotResult<bool> {
    let output = Command::new(self.bin_dir.join(name))
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute {}", name))?;

    Ok(output.status.success())
  }
}

/// Install the built wheel into a fresh environment and verify import + CLI
/// health. Fatal on any failure; nothing has been uploaded yet.
pub fn verify(layout: &ProjectLayout, ctx: &mut ReleaseContext) -> PilotResult<()> {
  let wheel = ctx
    .wheel()
    .ok_or_else(|| {
      PilotError::Publish(PublishError::SmokeTestFailed {
        detail: "no wheel available to install".to_string(),
      })
    })?
    .clone();

  println!("🧯 Smoke-testing {} in an isolated environment...", wheel.file_name());
  let env = EphemeralEnv::create()?;

  let install = env.pip_install(&wheel.path.to_string_lossy(), &[])?;
  if !install.status.success() {
    return Err(PilotError::Publish(PublishError::SmokeTestFailed {
      detail: format!(
        "wheel failed to install:\n{}",
        String::from_utf8_lossy(&install.stderr)
      ),
    }));
  }

  // Check (a): module imports and exposes the release version
  let code = format!("import {m}; print({m}.__version__)", m = layout.module_name);
  let reported = env.python_eval(&code).map_err(|e| {
    PilotError::Publish(PublishError::SmokeTestFailed {
      detail: format!("import check failed: {}", e),
    })
  })?;

  if reported != ctx.version.to_string() {
    return Err(PilotError::Publish(PublishError::SmokeTestFailed {
      detail: format!(
        "installed module reports version {} but the release is {}",
        reported, ctx.version
      ),
    }));
  }

  // Check (b): CLI entry point answers --help
  match &layout.cli_name {
    Some(cli) => {
      if !env.run_script(cli, &["--help"])? {
        return Err(PilotError::Publish(PublishError::SmokeTestFailed {
          detail: format!("{} --help exited non-zero", cli),
        }));
      }
      println!("✅ Smoke test passed (import + {} --help)", cli);
    }
    None => {
      ctx.warn("No [project.scripts] entry point; CLI smoke check skipped");
      println!("✅ Smoke test passed (import check)");
    }
  }

  Ok(())
  // env dropped here: the venv is removed regardless of outcome
}
