//! Release-version policy
//!
//! Given the local version and the registry's view of the package, decide
//! what version to actually release. This is a decision table, not nested
//! conditionals: the result is a tagged value the orchestrator acts on, which
//! also keeps the table trivially testable.

use crate::registry::RegistryQuery;
use crate::version::bump_patch;
use semver::Version;

/// Outcome of resolving the release version against registry state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// No collision; release the local version as-is
  Unchanged(Version),

  /// Collision and auto-bump enabled; release the bumped version
  /// (the caller must persist it back through VersionSource)
  Bumped(Version),

  /// Collision and auto-bump disabled; abort, suggesting the next patch
  Collision { current: Version, suggested: Version },
}

/// Decide the version to release.
///
/// | registry state   | auto_bump | result                 |
/// |------------------|-----------|------------------------|
/// | NotFound         | any       | Unchanged(local)       |
/// | VersionAbsent    | any       | Unchanged(local)       |
/// | VersionPresent   | false     | Collision (abort)      |
/// | VersionPresent   | true      | Bumped(local.patch+1)  |
///
/// The bump only ever increments the patch component; major/minor bumps are
/// an operator decision, not something a release driver infers.
pub fn resolve(local: &Version, query: RegistryQuery, auto_bump: bool) -> Resolution {
  match query {
    RegistryQuery::NotFound | RegistryQuery::VersionAbsent => Resolution::Unchanged(local.clone()),
    RegistryQuery::VersionPresent => {
      let next = bump_patch(local);
      if auto_bump {
        Resolution::Bumped(next)
      } else {
        Resolution::Collision {
          current: local.clone(),
          suggested: next,
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(s: &str) -> Version {
    s.parse().unwrap()
  }

  #[test]
  fn test_unpublished_package_releases_local_version() {
    // Scenario A: registry has never seen the package
    let result = resolve(&v("1.2.3"), RegistryQuery::NotFound, false);
    assert_eq!(result, Resolution::Unchanged(v("1.2.3")));
  }

  #[test]
  fn test_absent_version_releases_local_version() {
    let result = resolve(&v("1.2.3"), RegistryQuery::VersionAbsent, false);
    assert_eq!(result, Resolution::Unchanged(v("1.2.3")));
  }

  #[test]
  fn test_collision_without_auto_bump_aborts_with_suggestion() {
    // Scenario B: registry already has 1.2.3
    let result = resolve(&v("1.2.3"), RegistryQuery::VersionPresent, false);
    assert_eq!(
      result,
      Resolution::Collision {
        current: v("1.2.3"),
        suggested: v("1.2.4"),
      }
    );
  }

  #[test]
  fn test_collision_with_auto_bump_returns_next_patch() {
    // Scenario C: same collision, auto-bump enabled
    let result = resolve(&v("1.2.3"), RegistryQuery::VersionPresent, true);
    assert_eq!(result, Resolution::Bumped(v("1.2.4")));
  }

  #[test]
  fn test_resolve_is_idempotent_without_collision() {
    let first = resolve(&v("0.4.2"), RegistryQuery::VersionAbsent, true);
    let second = resolve(&v("0.4.2"), RegistryQuery::VersionAbsent, true);
    assert_eq!(first, second);
    assert_eq!(first, Resolution::Unchanged(v("0.4.2")));
  }

  #[test]
  fn test_bump_never_touches_major_minor() {
    let result = resolve(&v("2.0.0"), RegistryQuery::VersionPresent, true);
    assert_eq!(result, Resolution::Bumped(v("2.0.1")));
  }
}
