//! Bounded retry with fixed backoff
//!
//! The post-upload availability check is the only place in the pipeline with
//! real timing behavior, so the retry loop lives here as a standalone
//! primitive. The sleep function is injected, which lets tests drive the loop
//! with a fake clock instead of waiting out real delays.

use std::time::Duration;

/// Fixed-delay retry policy: at most `max_attempts` tries, sleeping `delay`
/// between consecutive attempts (never after the last one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
  pub max_attempts: u32,
  pub delay: Duration,
}

impl Backoff {
  pub const fn new(max_attempts: u32, delay: Duration) -> Self {
    Self { max_attempts, delay }
  }

  /// Run `op` until it returns Ok or attempts are exhausted.
  ///
  /// `op` receives the 1-based attempt number. On exhaustion the last error
  /// is returned; the caller decides whether that is fatal or a warning.
  pub fn run<T, E>(&self, mut sleep: impl FnMut(Duration), mut op: impl FnMut(u32) -> Result<T, E>) -> Result<T, E> {
    debug_assert!(self.max_attempts > 0);

    let mut attempt = 1;
    loop {
      match op(attempt) {
        Ok(value) => return Ok(value),
        Err(err) => {
          if attempt >= self.max_attempts {
            return Err(err);
          }
          sleep(self.delay);
          attempt += 1;
        }
      }
    }
  }
}

/// Sleep on the real clock. Production callers pass this to [`Backoff::run`].
pub fn real_sleep(d: Duration) {
  std::thread::sleep(d);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_attempt_success_never_sleeps() {
    let backoff = Backoff::new(5, Duration::from_secs(30));
    let mut slept = Vec::new();

    let result: Result<u32, &str> = backoff.run(|d| slept.push(d), |attempt| Ok(attempt));

    assert_eq!(result, Ok(1));
    assert!(slept.is_empty());
  }

  #[test]
  fn test_exhaustion_makes_exactly_max_attempts() {
    let backoff = Backoff::new(5, Duration::from_secs(30));
    let mut slept = Vec::new();
    let mut calls = 0;

    let result: Result<(), &str> = backoff.run(
      |d| slept.push(d),
      |_| {
        calls += 1;
        Err("not yet")
      },
    );

    assert_eq!(result, Err("not yet"));
    assert_eq!(calls, 5);
    // Sleeps only between attempts, not after the last failure
    assert_eq!(slept, vec![Duration::from_secs(30); 4]);
  }

  #[test]
  fn test_recovers_midway() {
    let backoff = Backoff::new(5, Duration::from_secs(1));
    let mut slept = Vec::new();

    let result: Result<&str, &str> = backoff.run(
      |d| slept.push(d),
      |attempt| if attempt < 3 { Err("propagating") } else { Ok("available") },
    );

    assert_eq!(result, Ok("available"));
    assert_eq!(slept.len(), 2);
  }

  #[test]
  fn test_single_attempt_policy() {
    let backoff = Backoff::new(1, Duration::from_secs(30));
    let mut calls = 0;

    let result: Result<(), &str> = backoff.run(
      |_| panic!("must not sleep with a single attempt"),
      |_| {
        calls += 1;
        Err("no")
      },
    );

    assert!(result.is_err());
    assert_eq!(calls, 1);
  }
}
