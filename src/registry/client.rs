//! PyPI JSON API client
//!
//! One best-effort read per pipeline run: `GET <base>/<package>/json`. A 404
//! means the package has never been released, which is a valid state, so it
//! maps to `NotFound` rather than an error. Transport failures bubble up as
//! errors so the orchestrator can downgrade them to a warning and proceed as
//! if the package were unknown. The client never mutates local state.

use crate::core::error::{PilotError, PilotResult};
use crate::registry::RegistryQuery;
use semver::Version;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default registry JSON endpoint
pub const DEFAULT_BASE_URL: &str = "https://pypi.org/pypi";

/// Shape of the registry's per-package JSON index (release map only)
#[derive(Debug, Deserialize)]
struct ReleaseIndex {
  #[serde(default)]
  releases: HashMap<String, serde_json::Value>,
}

/// Read-only registry client
pub struct RegistryClient {
  base_url: String,
  http: reqwest::blocking::Client,
}

impl RegistryClient {
  pub fn new() -> PilotResult<Self> {
    Self::with_base_url(DEFAULT_BASE_URL)
  }

  /// Injectable base URL, used by tests to point at a fake registry
  pub fn with_base_url(base_url: impl Into<String>) -> PilotResult<Self> {
    let http = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(10))
      .user_agent(concat!("pypilot/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| PilotError::message(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      base_url: base_url.into(),
      http,
    })
  }

  /// Query the registry for `package` and report where `version` stands.
  ///
  /// Errors mean the registry could not be read at all (no network, 5xx);
  /// the caller treats that as `NotFound` with a warning.
  pub fn lookup(&self, package: &str, version: &Version) -> PilotResult<RegistryQuery> {
    let url = format!("{}/{}/json", self.base_url, package);

    let response = self
      .http
      .get(&url)
      .send()
      .map_err(|e| PilotError::message(format!("Registry unreachable: {}", e)))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(RegistryQuery::NotFound);
    }

    if !response.status().is_success() {
      return Err(PilotError::message(format!(
        "Registry returned {} for {}",
        response.status(),
        url
      )));
    }

    let body = response
      .text()
      .map_err(|e| PilotError::message(format!("Failed to read registry response: {}", e)))?;

    parse_index(&body, version)
  }
}

/// Decide the query result from the raw JSON index
fn parse_index(body: &str, version: &Version) -> PilotResult<RegistryQuery> {
  let index: ReleaseIndex = serde_json::from_str(body)?;

  if index.releases.is_empty() {
    return Ok(RegistryQuery::NotFound);
  }

  if index.releases.contains_key(&version.to_string()) {
    Ok(RegistryQuery::VersionPresent)
  } else {
    Ok(RegistryQuery::VersionAbsent)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(s: &str) -> Version {
    s.parse().unwrap()
  }

  #[test]
  fn test_parse_index_version_present() {
    let body = r#"{"info": {"name": "storm-checker"}, "releases": {"1.2.2": [], "1.2.3": []}}"#;
    assert_eq!(parse_index(body, &v("1.2.3")).unwrap(), RegistryQuery::VersionPresent);
  }

  #[test]
  fn test_parse_index_version_absent() {
    let body = r#"{"info": {"name": "storm-checker"}, "releases": {"1.2.2": []}}"#;
    assert_eq!(parse_index(body, &v("1.2.3")).unwrap(), RegistryQuery::VersionAbsent);
  }

  #[test]
  fn test_parse_index_no_releases_yet() {
    let body = r#"{"info": {"name": "storm-checker"}, "releases": {}}"#;
    assert_eq!(parse_index(body, &v("1.2.3")).unwrap(), RegistryQuery::NotFound);
  }

  #[test]
  fn test_parse_index_missing_releases_key() {
    let body = r#"{"info": {"name": "storm-checker"}}"#;
    assert_eq!(parse_index(body, &v("1.2.3")).unwrap(), RegistryQuery::NotFound);
  }

  #[test]
  fn test_parse_index_malformed_json() {
    assert!(parse_index("not json", &v("1.2.3")).is_err());
  }
}
