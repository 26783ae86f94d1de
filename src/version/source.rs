//! The two authoritative version records, behind one accessor
//!
//! A Python project carries its version twice: the `version` field of
//! pyproject.toml and the module-level `__version__` constant. Two
//! independently mutated globals are a duplication hazard, so all reads and
//! writes go through `VersionSource`, which enforces one invariant at the
//! boundary: the records are either equal or the run stops (or, with the
//! auto-fix path, the module record is rewritten from the manifest). Writes
//! always update both records, never one without the other.

use crate::core::context::ProjectLayout;
use crate::core::error::{PilotError, PilotResult, ResultExt, VersionError};
use semver::Version;
use std::path::PathBuf;

/// Accessor for the manifest version and the module `__version__` constant
pub struct VersionSource {
  pyproject: PathBuf,
  module_init: PathBuf,
}

impl VersionSource {
  pub fn new(layout: &ProjectLayout) -> Self {
    Self {
      pyproject: layout.pyproject.clone(),
      module_init: layout.module_init.clone(),
    }
  }

  /// Read both records.
  ///
  /// The manifest version is required; the module constant may be absent
  /// (None), in which case [`reconcile`](Self::reconcile) writes it.
  pub fn read(&self) -> PilotResult<(Version, Option<Version>)> {
    let manifest = self.read_manifest()?;
    let module = self.read_module()?;
    Ok((manifest, module))
  }

  /// Rewrite the module constant from the manifest and return the value.
  ///
  /// On successful return the two records are equal.
  pub fn reconcile(&self, manifest: &Version) -> PilotResult<Version> {
    self.write_module(manifest)?;
    Ok(manifest.clone())
  }

  /// Persist `version` into BOTH records (manifest first, then module).
  ///
  /// Used by the auto-bump path to re-establish the equality invariant at
  /// the new value.
  pub fn write_both(&self, version: &Version) -> PilotResult<()> {
    self.write_manifest(version)?;
    self.write_module(version)?;
    Ok(())
  }

  fn read_manifest(&self) -> PilotResult<Version> {
    if !self.pyproject.exists() {
      return Err(PilotError::Version(VersionError::MissingFile {
        path: self.pyproject.clone(),
      }));
    }

    let content = std::fs::read_to_string(&self.pyproject)
      .with_context(|| format!("Failed to read {}", self.pyproject.display()))?;
    let doc: toml_edit::DocumentMut = content.parse()?;

    let raw = doc
      .get("project")
      .and_then(|p| p.get("version"))
      .and_then(|v| v.as_str())
      .ok_or_else(|| {
        PilotError::Version(VersionError::Unreadable {
          path: self.pyproject.clone(),
          reason: "no `version` field in [project] table".to_string(),
        })
      })?;

    raw.parse().map_err(|e: semver::Error| {
      PilotError::Version(VersionError::Unreadable {
        path: self.pyproject.clone(),
        reason: e.to_string(),
      })
    })
  }

  fn read_module(&self) -> PilotResult<Option<Version>> {
    if !self.module_init.exists() {
      return Err(PilotError::Version(VersionError::MissingFile {
        path: self.module_init.clone(),
      }));
    }

    let content = std::fs::read_to_string(&self.module_init)
      .with_context(|| format!("Failed to read {}", self.module_init.display()))?;

    match parse_dunder_version(&content) {
      Some(raw) => {
        let version = raw.parse().map_err(|e: semver::Error| {
          PilotError::Version(VersionError::Unreadable {
            path: self.module_init.clone(),
            reason: e.to_string(),
          })
        })?;
        Ok(Some(version))
      }
      None => Ok(None),
    }
  }

  fn write_manifest(&self, version: &Version) -> PilotResult<()> {
    let content = std::fs::read_to_string(&self.pyproject)
      .with_context(|| format!("Failed to read {}", self.pyproject.display()))?;
    let mut doc: toml_edit::DocumentMut = content.parse()?;

    match doc.get_mut("project").and_then(|p| p.as_table_mut()) {
      Some(project) => project["version"] = toml_edit::value(version.to_string()),
      None => return Err(PilotError::message("No [project] table in pyproject.toml")),
    }

    std::fs::write(&self.pyproject, doc.to_string())
      .with_context(|| format!("Failed to write {}", self.pyproject.display()))?;
    Ok(())
  }

  fn write_module(&self, version: &Version) -> PilotResult<()> {
    let content = std::fs::read_to_string(&self.module_init)
      .with_context(|| format!("Failed to read {}", self.module_init.display()))?;

    let written = rewrite_dunder_version(&content, version);
    std::fs::write(&self.module_init, written)
      .with_context(|| format!("Failed to write {}", self.module_init.display()))?;
    Ok(())
  }
}

/// Extract the value of a module-level `__version__ = "..."` assignment
fn parse_dunder_version(content: &str) -> Option<String> {
  for line in content.lines() {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("__version__") {
      let rest = rest.trim_start();
      if let Some(value) = rest.strip_prefix('=') {
        let value = value.trim();
        let value = value
          .strip_prefix('"')
          .and_then(|v| v.split('"').next())
          .or_else(|| value.strip_prefix('\'').and_then(|v| v.split('\'').next()))?;
        return Some(value.to_string());
      }
    }
  }
  None
}

/// Replace the `__version__` assignment in place, or append one if absent.
/// All other lines pass through untouched.
fn rewrite_dunder_version(content: &str, version: &Version) -> String {
  let assignment = format!("__version__ = \"{}\"", version);
  let mut replaced = false;

  let mut lines: Vec<String> = content
    .lines()
    .map(|line| {
      if !replaced && line.trim_start().starts_with("__version__") {
        replaced = true;
        assignment.clone()
      } else {
        line.to_string()
      }
    })
    .collect();

  if !replaced {
    lines.push(assignment);
  }

  let mut out = lines.join("\n");
  out.push('\n');
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::error::PilotError;

  fn fixture(pyproject_version: &str, init_content: &str) -> (tempfile::TempDir, VersionSource) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(
      root.join("pyproject.toml"),
      format!(
        "[project]\nname = \"storm-checker\"\nversion = \"{}\"\ndescription = \"x\"\n",
        pyproject_version
      ),
    )
    .unwrap();
    std::fs::write(root.join("__init__.py"), init_content).unwrap();

    let source = VersionSource {
      pyproject: root.join("pyproject.toml"),
      module_init: root.join("__init__.py"),
    };
    (dir, source)
  }

  #[test]
  fn test_read_both_records() {
    let (_dir, source) = fixture("1.2.3", "\"\"\"Package.\"\"\"\n__version__ = \"1.2.3\"\n");
    let (manifest, module) = source.read().unwrap();
    assert_eq!(manifest, "1.2.3".parse().unwrap());
    assert_eq!(module, Some("1.2.3".parse().unwrap()));
  }

  #[test]
  fn test_read_single_quoted_constant() {
    let (_dir, source) = fixture("1.2.3", "__version__ = '1.2.3'\n");
    let (_, module) = source.read().unwrap();
    assert_eq!(module, Some("1.2.3".parse().unwrap()));
  }

  #[test]
  fn test_read_missing_constant_is_none() {
    let (_dir, source) = fixture("1.2.3", "\"\"\"Package without a version.\"\"\"\n");
    let (_, module) = source.read().unwrap();
    assert_eq!(module, None);
  }

  #[test]
  fn test_read_missing_module_file_is_fatal() {
    let (dir, source) = fixture("1.2.3", "__version__ = \"1.2.3\"\n");
    std::fs::remove_file(dir.path().join("__init__.py")).unwrap();
    let err = source.read().unwrap_err();
    assert!(matches!(err, PilotError::Version(VersionError::MissingFile { .. })));
  }

  #[test]
  fn test_reconcile_leaves_records_equal() {
    let (_dir, source) = fixture("2.0.0", "__version__ = \"1.9.9\"\n");
    let corrected = source.reconcile(&"2.0.0".parse().unwrap()).unwrap();
    assert_eq!(corrected, "2.0.0".parse().unwrap());

    let (manifest, module) = source.read().unwrap();
    assert_eq!(Some(manifest), module);
  }

  #[test]
  fn test_reconcile_appends_missing_constant() {
    let (_dir, source) = fixture("2.0.0", "\"\"\"No constant here.\"\"\"\n");
    source.reconcile(&"2.0.0".parse().unwrap()).unwrap();
    let (manifest, module) = source.read().unwrap();
    assert_eq!(Some(manifest), module);
  }

  #[test]
  fn test_write_both_updates_both_records() {
    let (_dir, source) = fixture("1.2.3", "__version__ = \"1.2.3\"\n");
    source.write_both(&"1.2.4".parse().unwrap()).unwrap();

    let (manifest, module) = source.read().unwrap();
    assert_eq!(manifest, "1.2.4".parse().unwrap());
    assert_eq!(module, Some("1.2.4".parse().unwrap()));
  }

  #[test]
  fn test_write_module_preserves_other_lines() {
    let (dir, source) = fixture("1.2.3", "\"\"\"Docstring.\"\"\"\n__version__ = \"1.2.3\"\nAUTHOR = \"x\"\n");
    source.write_both(&"1.2.4".parse().unwrap()).unwrap();

    let content = std::fs::read_to_string(dir.path().join("__init__.py")).unwrap();
    assert!(content.contains("\"\"\"Docstring.\"\"\""));
    assert!(content.contains("AUTHOR = \"x\""));
    assert!(content.contains("__version__ = \"1.2.4\""));
  }

  #[test]
  fn test_write_manifest_preserves_formatting() {
    let (dir, source) = fixture("1.2.3", "__version__ = \"1.2.3\"\n");
    source.write_both(&"1.2.4".parse().unwrap()).unwrap();

    let content = std::fs::read_to_string(dir.path().join("pyproject.toml")).unwrap();
    // toml_edit keeps untouched lines byte-identical
    assert!(content.contains("name = \"storm-checker\""));
    assert!(content.contains("description = \"x\""));
    assert!(content.contains("version = \"1.2.4\""));
  }

  #[test]
  fn test_unparseable_manifest_version() {
    let (_dir, source) = fixture("not-a-version", "__version__ = \"1.2.3\"\n");
    let err = source.read().unwrap_err();
    assert!(matches!(err, PilotError::Version(VersionError::Unreadable { .. })));
  }
}
