//! Boundary discovery: find the last valid leaf without knowing the
//! collection length up front.
//!
//! The archive answers out-of-range leaf requests with HTTP 200 and a fixed
//! placeholder body, so existence is decided by fingerprinting the response
//! and comparing against the configured sentinel. The `exists` predicate is
//! assumed monotonic (true up to the boundary, false after); that is a
//! precondition, not something we verify.

use std::time::Duration;

use crate::collection::Collection;
use crate::fetch::LeafFetcher;
use crate::fingerprint::Fingerprint;
use crate::retry::{run_with_retry, RetryPolicy};

/// Probes one leaf index. Returns true iff a fetch succeeded within the
/// retry budget and the body differs from the sentinel. Retry exhaustion is
/// reported as "absent" (fail-closed), which can under-report the boundary
/// during a transient outage near the end of the sequence.
pub fn leaf_exists(
    fetcher: &dyn LeafFetcher,
    collection: &Collection,
    index: u64,
    sentinel: &Fingerprint,
    policy: &RetryPolicy,
) -> bool {
    let url = collection.leaf_url(index);
    match run_with_retry(policy, None, || fetcher.fetch_bytes(&url)) {
        Ok(bytes) => {
            let exists = Fingerprint::of_bytes(&bytes) != *sentinel;
            tracing::debug!(index, exists, "probe");
            exists
        }
        Err(e) => {
            tracing::debug!(index, error = %e, "probe exhausted retries, treating leaf as absent");
            false
        }
    }
}

/// Binary search for the boundary on `[lo, hi]`: returns the largest `x`
/// with `exists(x)`, plus one. Assumes `exists(lo)` holds and `exists` is
/// monotonic; when every index up to `hi` exists, returns `hi + 1` (the
/// caller chose too small an upper bound).
///
/// Performs at most `ceil(log2(hi - lo))` predicate evaluations.
pub fn search_boundary<F>(lo: u64, hi: u64, mut exists: F) -> u64
where
    F: FnMut(u64) -> bool,
{
    let (mut lo, mut hi) = (lo, hi.max(lo));
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if exists(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo + 1
}

/// Runs boundary discovery over the network: binary search driven by
/// sentinel probes, pacing `pace` between probes so the archive is not
/// hammered. Returns the number of leaves (last valid index + 1).
pub fn discover_boundary(
    fetcher: &dyn LeafFetcher,
    collection: &Collection,
    sentinel: &Fingerprint,
    policy: &RetryPolicy,
    upper_bound: u64,
    pace: Duration,
) -> u64 {
    tracing::info!(
        collection = collection.identifier(),
        upper_bound,
        "searching for the last valid leaf"
    );
    let boundary = search_boundary(0, upper_bound, |i| {
        if !pace.is_zero() {
            std::thread::sleep(pace);
        }
        leaf_exists(fetcher, collection, i, sentinel, policy)
    });
    tracing::info!(
        collection = collection.identifier(),
        boundary,
        "discovery complete"
    );
    boundary
}
