//! Test/coverage gate
//!
//! Runs the project's test suite with coverage enabled and enforces the
//! configured threshold. The coverage check is best-effort: it only applies
//! when a coverage report exists after a passing run. Test failure blocks the
//! release unless --force is set, in which case the run proceeds with the
//! failure recorded and the coverage check skipped.

use crate::core::context::{ProjectLayout, ReleaseContext};
use crate::core::error::{GateError, PilotError, PilotResult, ResultExt};
use std::path::Path;
use std::process::Command;

/// Verdict of the gate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateResult {
  pub passed: bool,
  pub coverage_pct: Option<u32>,
}

/// Run the test/coverage gate and record the verdict on the context
pub fn run(layout: &ProjectLayout, ctx: &mut ReleaseContext) -> PilotResult<GateResult> {
  if ctx.skip_tests {
    ctx.warn("Tests skipped (--skip-tests); releasing an unverified build");
    let result = GateResult {
      passed: true,
      coverage_pct: None,
    };
    ctx.tests_passed = Some(true);
    return Ok(result);
  }

  println!("🧪 Running test suite with coverage...");
  let output = Command::new("python")
    .current_dir(&layout.root)
    .args(["-m", "pytest", "-q", "--cov", &layout.module_name, "--cov-report", "html"])
    .output()
    .context("Failed to execute pytest")?;

  if !output.status.success() {
    let detail = summarize_pytest_output(&output.stdout, &output.stderr);
    if !ctx.force {
      return Err(PilotError::Gate(GateError::TestsFailed { detail }));
    }
    ctx.warn(format!("Tests failed but --force is set: {}", detail));
    ctx.tests_passed = Some(false);
    // Coverage data from a failing run is meaningless; don't enforce it
    return Ok(GateResult {
      passed: false,
      coverage_pct: None,
    });
  }

  println!("✅ Tests passed");
  ctx.tests_passed = Some(true);

  let coverage_pct = read_coverage_report(&layout.root);
  match coverage_pct {
    Some(pct) => {
      ctx.coverage_pct = Some(pct);
      if pct < ctx.coverage_threshold {
        if !ctx.force {
          return Err(PilotError::Gate(GateError::CoverageBelowThreshold {
            actual: pct,
            threshold: ctx.coverage_threshold,
          }));
        }
        ctx.warn(format!(
          "Coverage {}% is below the {}% threshold (--force)",
          pct, ctx.coverage_threshold
        ));
      } else {
        println!("✅ Coverage: {}% (threshold {}%)", pct, ctx.coverage_threshold);
      }
    }
    None => {
      // The threshold is only enforced when coverage data exists
      ctx.warn("No coverage report found; threshold not enforced");
    }
  }

  Ok(GateResult {
    passed: true,
    coverage_pct,
  })
}

/// Extract the total percentage from coverage.py's HTML report, if present
fn read_coverage_report(root: &Path) -> Option<u32> {
  let report = root.join("htmlcov").join("index.html");
  let html = std::fs::read_to_string(report).ok()?;
  parse_coverage_percent(&html)
}

/// Find the `pc_cov` total in coverage.py HTML output (`<span class="pc_cov">87%</span>`)
fn parse_coverage_percent(html: &str) -> Option<u32> {
  let idx = html.find("pc_cov")?;
  let rest = &html[idx..];
  let start = rest.find('>')? + 1;
  let digits: String = rest[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
  digits.parse().ok()
}

/// Compact the runner's output to the last few meaningful lines
fn summarize_pytest_output(stdout: &[u8], stderr: &[u8]) -> String {
  let stdout = String::from_utf8_lossy(stdout);
  let stderr = String::from_utf8_lossy(stderr);
  let source = if stdout.trim().is_empty() { &stderr } else { &stdout };

  let lines: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
  let tail = lines.len().saturating_sub(5);
  lines[tail..].join("\n")
}
