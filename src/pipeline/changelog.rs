//! Changelog synchronization from conventional commits
//!
//! Derives a dated section for the release version from commit subjects since
//! the last tag: `feat:` subjects land in an "Added" bucket, `fix:` in
//! "Fixed", everything else is ignored. The stage is idempotent — a section
//! for the version already present means re-running the pipeline never
//! duplicates an entry. No baseline tag means nothing to diff against, so the
//! stage skips (first release, not an error).

use crate::core::context::{ProjectLayout, ReleaseContext};
use crate::core::error::{PilotResult, ResultExt};
use crate::core::vcs::SystemGit;
use semver::Version;

/// Commit subjects sorted into changelog buckets
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Buckets {
  pub added: Vec<String>,
  pub fixed: Vec<String>,
}

impl Buckets {
  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.fixed.is_empty()
  }
}

/// Sync the changelog for the release version. Returns whether a section was
/// written (false = skipped or already present).
pub fn sync(layout: &ProjectLayout, git: &SystemGit, ctx: &mut ReleaseContext) -> PilotResult<bool> {
  let Some(changelog_path) = &layout.changelog else {
    ctx.warn("No CHANGELOG.md; skipping changelog sync");
    return Ok(false);
  };

  let Some(since_tag) = git.latest_tag()? else {
    ctx.warn("No previous tag; skipping changelog sync (no baseline to diff against)");
    return Ok(false);
  };

  let existing = std::fs::read_to_string(changelog_path)
    .with_context(|| format!("Failed to read {}", changelog_path.display()))?;

  if has_entry(&existing, &ctx.version) {
    println!("📝 Changelog already has an entry for {}; leaving it alone", ctx.version);
    return Ok(false);
  }

  let subjects = git.subjects_since(&since_tag)?;
  let buckets = classify(&subjects);

  if buckets.is_empty() {
    ctx.warn(format!(
      "No feat/fix commits since {}; changelog left untouched",
      since_tag
    ));
    return Ok(false);
  }

  let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
  let section = render_section(&ctx.version, &date, &buckets);
  let updated = insert_section(&existing, &section);

  std::fs::write(changelog_path, updated)
    .with_context(|| format!("Failed to write {}", changelog_path.display()))?;

  println!("📝 Added changelog section for {} ({} since {})", ctx.version, date, since_tag);
  Ok(true)
}

/// At most one entry per version string: the uniqueness check
pub fn has_entry(content: &str, version: &Version) -> bool {
  let header = format!("## [{}]", version);
  content.lines().any(|line| line.trim_start().starts_with(&header))
}

/// Sort commit subjects into buckets by conventional-commit prefix.
///
/// Accepts `feat:`, `feat(scope):`, and the breaking `feat!:` spellings;
/// everything without a recognized prefix is ignored.
pub fn classify(subjects: &[String]) -> Buckets {
  let mut buckets = Buckets::default();

  for subject in subjects {
    if let Some(description) = strip_prefix_family(subject, "feat") {
      buckets.added.push(description);
    } else if let Some(description) = strip_prefix_family(subject, "fix") {
      buckets.fixed.push(description);
    }
  }

  buckets
}

/// Match `<kind>:`, `<kind>(scope):`, `<kind>!:` and return the description
fn strip_prefix_family(subject: &str, kind: &str) -> Option<String> {
  let rest = subject.strip_prefix(kind)?;

  // Optional (scope), optional !, then the mandatory colon
  let rest = match rest.strip_prefix('(') {
    Some(after_paren) => {
      let close = after_paren.find(')')?;
      &after_paren[close + 1..]
    }
    None => rest,
  };
  let rest = rest.strip_prefix('!').unwrap_or(rest);
  let description = rest.strip_prefix(':')?;

  let description = description.trim();
  (!description.is_empty()).then(|| description.to_string())
}

/// Render a dated Keep-a-Changelog style section
pub fn render_section(version: &Version, date: &str, buckets: &Buckets) -> String {
  let mut out = format!("## [{}] - {}\n\n", version, date);

  if !buckets.added.is_empty() {
    out.push_str("### Added\n");
    for entry in &buckets.added {
      out.push_str(&format!("- {}\n", entry));
    }
    out.push('\n');
  }

  if !buckets.fixed.is_empty() {
    out.push_str("### Fixed\n");
    for entry in &buckets.fixed {
      out.push_str(&format!("- {}\n", entry));
    }
    out.push('\n');
  }

  out
}

/// Prepend the new section at the top of the changelog, after the file
/// header when one exists
pub fn insert_section(existing: &str, section: &str) -> String {
  if existing.contains("# Changelog") {
    if let Some(header_end) = existing.find("\n\n") {
      let (header, rest) = existing.split_at(header_end + 2);
      return format!("{}{}{}", header, section, rest);
    }
    // Header with no blank line anywhere: still insert right below it,
    // never at the bottom
    if let Some(line_end) = existing.find('\n') {
      let (header, rest) = existing.split_at(line_end + 1);
      return format!("{}\n{}{}", header, section, rest);
    }
    return format!("{}\n\n{}", existing, section);
  }
  format!("{}{}", section, existing)
}
