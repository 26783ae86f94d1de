//! Registry (PyPI) read-side interface

pub mod client;

pub use client::RegistryClient;

/// What the registry knows about the package and the candidate version.
///
/// Derived from a single network read; never cached across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryQuery {
  /// Package has no releases yet (or the registry could not be read) —
  /// first release is a valid state, never fatal
  NotFound,

  /// Package exists, the queried version does not
  VersionAbsent,

  /// The queried version is already published (collision)
  VersionPresent,
}
