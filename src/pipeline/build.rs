//! Artifact build, validation, and optional signing
//!
//! Invokes the build backend (`python -m build`) after clearing any previous
//! output, so rebuilds are idempotent. The stage fails when the backend
//! fails, when no wheel appears, or when the expected source archive is
//! absent, and every artifact must embed the release version. All artifacts
//! then pass through the registry-format validator (`twine check`). Signing
//! is opt-in: a missing gpg downgrades to a skipped step, a failing gpg when
//! signing was requested is fatal.

use crate::core::context::{Artifact, ArtifactKind, ProjectLayout, ReleaseContext};
use crate::core::error::{BuildError, PilotError, PilotResult, ResultExt};
use semver::Version;
use std::io;
use std::path::Path;
use std::process::Command;

/// Build the wheel and source archive for the release version, validate
/// them, and record them on the context
pub fn run(layout: &ProjectLayout, ctx: &mut ReleaseContext) -> PilotResult<()> {
  clear_dist(&layout.dist_dir)?;

  println!("🔨 Building distributions (python -m build)...");
  let output = Command::new("python")
    .current_dir(&layout.root)
    .args(["-m", "build"])
    .output()
    .context("Failed to execute the build backend")?;

  if !output.status.success() {
    return Err(PilotError::Build(BuildError::BackendFailed {
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }));
  }

  let artifacts = scan_dist(&layout.dist_dir, &layout.module_name, &ctx.version)?;
  for artifact in &artifacts {
    println!("   📦 {}", artifact.file_name());
  }

  validate(&layout.root, &artifacts)?;
  println!("✅ Artifacts passed registry-format validation");

  if ctx.sign_release {
    sign(ctx, &artifacts)?;
  }

  ctx.artifacts = artifacts;
  Ok(())
}

/// Remove any previous build output (idempotent rebuild)
fn clear_dist(dist_dir: &Path) -> PilotResult<()> {
  match std::fs::remove_dir_all(dist_dir) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(PilotError::Io(e)),
  }
  std::fs::create_dir_all(dist_dir).context("Failed to create dist directory")?;
  Ok(())
}

/// Expected sdist filename for this release (PEP 625 normalized name)
pub fn expected_sdist_name(module_name: &str, version: &Version) -> String {
  format!("{}-{}.tar.gz", module_name, version)
}

/// Collect and check the built artifacts: exactly the wheel + sdist pair,
/// each embedding the release version
pub fn scan_dist(dist_dir: &Path, module_name: &str, version: &Version) -> PilotResult<Vec<Artifact>> {
  let mut wheels = Vec::new();
  let mut sdist = None;
  let expected_sdist = expected_sdist_name(module_name, version);

  for entry in std::fs::read_dir(dist_dir).context("Failed to read dist directory")? {
    let path = entry.context("Failed to read dist entry")?.path();
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    if name.ends_with(".whl") {
      wheels.push(Artifact {
        kind: ArtifactKind::Wheel,
        path,
      });
    } else if name == expected_sdist {
      sdist = Some(Artifact {
        kind: ArtifactKind::SourceArchive,
        path,
      });
    }
  }

  if wheels.is_empty() {
    return Err(PilotError::Build(BuildError::MissingWheel));
  }
  let Some(sdist) = sdist else {
    return Err(PilotError::Build(BuildError::MissingSdist {
      expected: expected_sdist,
    }));
  };

  let mut artifacts = wheels;
  artifacts.push(sdist);

  // No artifact is uploaded whose embedded version differs from the release
  for artifact in &artifacts {
    if !artifact.embeds_version(version) {
      return Err(PilotError::Build(BuildError::VersionEmbedding {
        artifact: artifact.file_name(),
        expected: version.to_string(),
      }));
    }
  }

  Ok(artifacts)
}

/// Run the registry-format validator over all artifacts
fn validate(root: &Path, artifacts: &[Artifact]) -> PilotResult<()> {
  let mut cmd = Command::new("python");
  cmd.current_dir(root).args(["-m", "twine", "check"]);
  for artifact in artifacts {
    cmd.arg(&artifact.path);
  }

  let output = cmd.output().context("Failed to execute twine check")?;

  if !output.status.success() {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(PilotError::Build(BuildError::ValidatorFailed {
      detail: format!("{}{}", stdout, stderr),
    }));
  }

  Ok(())
}

/// Produce a detached ASCII-armored signature per artifact.
///
/// gpg not being installed downgrades to a skipped step; gpg failing on an
/// artifact when signing was explicitly requested is fatal.
fn sign(ctx: &mut ReleaseContext, artifacts: &[Artifact]) -> PilotResult<()> {
  for artifact in artifacts {
    let result = Command::new("gpg")
      .args(["--batch", "--yes", "--armor", "--detach-sign"])
      .arg(&artifact.path)
      .output();

    let output = match result {
      Ok(output) => output,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        ctx.warn("gpg not found; releasing unsigned artifacts");
        return Ok(());
      }
      Err(e) => return Err(PilotError::Io(e)),
    };

    if !output.status.success() {
      return Err(PilotError::Build(BuildError::SigningFailed {
        artifact: artifact.file_name(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    println!("   🔏 Signed {}", artifact.file_name());
  }

  Ok(())
}
