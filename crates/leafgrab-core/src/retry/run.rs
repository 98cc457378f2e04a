//! Retry loop: run a fetch until success or the policy says stop.

use std::time::Instant;

use crate::fetch::FetchError;

use super::classify::classify;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs a fetch closure until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
/// Returns the final error once the budget is exhausted.
///
/// When `deadline` is given, no further attempt starts once it has passed:
/// the attempt in flight finishes (bounded by its own timeouts) and its
/// error is returned instead of retrying.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    mut f: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                if deadline.map_or(false, |d| Instant::now() >= d) {
                    return Err(e);
                }
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
