//! Version records and release-version policy
//!
//! - **source**: the two authoritative on-disk version records (pyproject.toml
//!   and the module `__version__` constant) behind one accessor with a strict
//!   equality invariant
//! - **policy**: the decision table that picks the version to actually release

pub mod policy;
pub mod source;

use semver::Version;

/// Next patch release of `v`. Major and minor are never touched here; the
/// auto-bump path is deliberately conservative.
pub fn bump_patch(v: &Version) -> Version {
  Version::new(v.major, v.minor, v.patch + 1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bump_patch_only_touches_patch() {
    assert_eq!(bump_patch(&"1.4.9".parse().unwrap()), "1.4.10".parse().unwrap());
    assert_eq!(bump_patch(&"2.0.0".parse().unwrap()), "2.0.1".parse().unwrap());
    assert_eq!(bump_patch(&"0.0.0".parse().unwrap()), "0.0.1".parse().unwrap());
  }

  #[test]
  fn test_bump_patch_is_deterministic() {
    let v: Version = "3.7.11".parse().unwrap();
    assert_eq!(bump_patch(&v), bump_patch(&v));
  }
}
