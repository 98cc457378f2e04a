//! Bulk leaf acquisition: one fetch task per index in `[0, boundary)`,
//! admitted in index order through a bounded gate, each task independently
//! retried. Tasks finish in arbitrary order; the run is complete when every
//! task has reached a terminal state. The scheduler itself never fails over
//! remote errors; outcomes are reported in the summary.

mod gate;

pub use gate::AdmissionGate;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::collection::Collection;
use crate::fetch::LeafFetcher;
use crate::retry::{run_with_retry, RetryPolicy};

/// Outcome counts for one bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Tasks admitted and started.
    pub submitted: u64,
    /// Leaves persisted successfully.
    pub downloaded: u64,
    /// Leaves abandoned after retry exhaustion.
    pub failed: u64,
    /// Leaves never submitted because the overall deadline passed.
    pub skipped: u64,
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |d| Instant::now() >= d)
}

/// Fetches one leaf with retries and persists it at `dest`.
/// Returns false once the retry budget is exhausted (leaf abandoned,
/// nothing left on disk). Once `deadline` passes, no further retry starts.
fn fetch_leaf(
    fetcher: &dyn LeafFetcher,
    collection: &Collection,
    index: u64,
    dest: &Path,
    policy: &RetryPolicy,
    deadline: Option<Instant>,
) -> bool {
    let url = collection.leaf_url(index);
    match run_with_retry(policy, deadline, || fetcher.fetch_to_path(&url, dest)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(index, error = %e, "leaf abandoned after retries");
            false
        }
    }
}

/// Downloads every leaf in `[0, boundary)` into `dest_dir`, at most
/// `concurrency_cap` fetches in flight at once. Each index is submitted
/// exactly once, in order. Once `failed` reaches the cap the gate is
/// bypassed and remaining tasks start immediately (liveness escape).
///
/// When `deadline` is given, indices not yet submitted once it passes are
/// skipped and counted in the summary, and already-running fetches stop
/// retrying at the next attempt boundary (each attempt itself is bounded by
/// its per-attempt timeouts).
pub fn acquire_all(
    fetcher: Arc<dyn LeafFetcher>,
    collection: &Collection,
    boundary: u64,
    dest_dir: &Path,
    concurrency_cap: usize,
    policy: &RetryPolicy,
    deadline: Option<Instant>,
) -> Result<AcquisitionSummary> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("create output dir {}", dest_dir.display()))?;

    let gate = Arc::new(AdmissionGate::new(concurrency_cap));
    let downloaded = Arc::new(AtomicU64::new(0));
    let collection = Arc::new(collection.clone());
    let dest_dir: PathBuf = dest_dir.to_path_buf();

    tracing::info!(
        collection = collection.identifier(),
        leaves = boundary,
        cap = gate.cap(),
        "starting bulk acquisition"
    );

    let mut handles = Vec::with_capacity(boundary.min(1 << 16) as usize);
    let mut submitted = 0u64;
    let mut skipped = 0u64;
    let mut escape_logged = false;

    for index in 0..boundary {
        if deadline_passed(deadline) {
            skipped = boundary - index;
            break;
        }

        let escaped = gate.admit();
        // The gate can block for a while; the deadline may have expired in
        // the meantime, so give the slot back instead of starting the task.
        if deadline_passed(deadline) {
            gate.finish(false);
            skipped = boundary - index;
            break;
        }
        if escaped && !escape_logged {
            tracing::warn!(
                failures = gate.failures(),
                cap = gate.cap(),
                "failure budget exhausted, admission cap bypassed for remaining leaves"
            );
            escape_logged = true;
        }
        submitted += 1;

        let fetcher = Arc::clone(&fetcher);
        let collection = Arc::clone(&collection);
        let gate = Arc::clone(&gate);
        let downloaded = Arc::clone(&downloaded);
        let dest = dest_dir.join(collection.leaf_filename(index));
        let policy = *policy;
        handles.push(thread::spawn(move || {
            let ok = fetch_leaf(
                fetcher.as_ref(),
                &collection,
                index,
                &dest,
                &policy,
                deadline,
            );
            if ok {
                downloaded.fetch_add(1, Ordering::Relaxed);
            }
            gate.finish(!ok);
        }));
    }

    if skipped > 0 {
        tracing::warn!(
            skipped,
            "overall deadline passed, remaining leaves not submitted"
        );
    }

    for h in handles {
        h.join()
            .unwrap_or_else(|e| panic!("fetch task panicked: {:?}", e));
    }

    let summary = AcquisitionSummary {
        submitted,
        downloaded: downloaded.load(Ordering::Relaxed),
        failed: gate.failures() as u64,
        skipped,
    };
    tracing::info!(
        downloaded = summary.downloaded,
        failed = summary.failed,
        skipped = summary.skipped,
        "bulk acquisition complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn index_of(dest: &Path) -> u64 {
        let stem = dest.file_stem().unwrap().to_str().unwrap();
        stem.strip_prefix("leaf").unwrap().parse().unwrap()
    }

    fn test_collection() -> Collection {
        Collection::new("mag", "https://example.org", "/12/items").unwrap()
    }

    /// Fetcher that records per-index attempts and tracks peak concurrency.
    struct SyntheticFetcher {
        attempts: Mutex<HashMap<u64, u32>>,
        in_flight: Mutex<usize>,
        peak: Mutex<usize>,
        fail_all: bool,
        delay: Duration,
    }

    impl SyntheticFetcher {
        fn new(fail_all: bool) -> Self {
            Self::with_delay(fail_all, Duration::from_millis(2))
        }

        fn with_delay(fail_all: bool, delay: Duration) -> Self {
            Self {
                attempts: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(0),
                peak: Mutex::new(0),
                fail_all,
                delay,
            }
        }

        fn peak_concurrency(&self) -> usize {
            *self.peak.lock().unwrap()
        }

        fn attempts_for(&self, index: u64) -> u32 {
            *self.attempts.lock().unwrap().get(&index).unwrap_or(&0)
        }
    }

    impl LeafFetcher for SyntheticFetcher {
        fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            unimplemented!("bulk phase only uses fetch_to_path")
        }

        fn fetch_to_path(&self, _url: &str, dest: &Path) -> Result<(), FetchError> {
            let index = index_of(dest);
            *self.attempts.lock().unwrap().entry(index).or_insert(0) += 1;
            {
                let mut n = self.in_flight.lock().unwrap();
                *n += 1;
                let mut peak = self.peak.lock().unwrap();
                *peak = (*peak).max(*n);
            }
            thread::sleep(self.delay);
            *self.in_flight.lock().unwrap() -= 1;
            if self.fail_all {
                // Retryable kind, so each leaf burns its full budget.
                return Err(FetchError::Http(503));
            }
            fs::write(dest, format!("leaf {}", index))?;
            Ok(())
        }
    }

    #[test]
    fn every_index_submitted_once_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::new(false));
        let summary = acquire_all(
            Arc::clone(&fetcher) as Arc<dyn LeafFetcher>,
            &test_collection(),
            30,
            dir.path(),
            5,
            &fast_policy(),
            None,
        )
        .unwrap();

        assert_eq!(summary.submitted, 30);
        assert_eq!(summary.downloaded, 30);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 0);
        for i in 0..30u64 {
            assert_eq!(fetcher.attempts_for(i), 1, "index {} fetched once", i);
            let path = dir.path().join(format!("leaf{}.jpeg", i));
            assert_eq!(fs::read_to_string(&path).unwrap(), format!("leaf {}", i));
        }
    }

    #[test]
    fn active_fetches_never_exceed_cap() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::new(false));
        acquire_all(
            Arc::clone(&fetcher) as Arc<dyn LeafFetcher>,
            &test_collection(),
            60,
            dir.path(),
            8,
            &fast_policy(),
            None,
        )
        .unwrap();
        assert!(
            fetcher.peak_concurrency() <= 8,
            "peak {} exceeded cap",
            fetcher.peak_concurrency()
        );
    }

    #[test]
    fn exhausted_leaves_are_abandoned_and_nothing_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::new(true));
        let policy = fast_policy();
        let summary = acquire_all(
            Arc::clone(&fetcher) as Arc<dyn LeafFetcher>,
            &test_collection(),
            10,
            dir.path(),
            4,
            &policy,
            None,
        )
        .unwrap();

        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.failed, 10);
        for i in 0..10u64 {
            assert_eq!(
                fetcher.attempts_for(i),
                policy.max_attempts,
                "index {} must burn the full retry budget",
                i
            );
            assert!(!dir.path().join(format!("leaf{}.jpeg", i)).exists());
        }
    }

    #[test]
    fn run_completes_despite_total_failure() {
        // Liveness: with everything failing, the budget escape must keep
        // admission moving and the run must still terminate.
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::new(true));
        let summary = acquire_all(
            fetcher as Arc<dyn LeafFetcher>,
            &test_collection(),
            40,
            dir.path(),
            4,
            &fast_policy(),
            None,
        )
        .unwrap();
        assert_eq!(summary.submitted, 40);
        assert_eq!(summary.failed, 40);
    }

    #[test]
    fn deadline_expiring_mid_run_stops_retries_and_submissions() {
        // Every fetch fails retryably and outlives the deadline. The first
        // admitted leaf must stop after the attempt in flight instead of
        // burning its full budget, and leaves still waiting on the gate must
        // not start at all.
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::with_delay(
            true,
            Duration::from_millis(200),
        ));
        let policy = RetryPolicy {
            max_attempts: 8,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let summary = acquire_all(
            Arc::clone(&fetcher) as Arc<dyn LeafFetcher>,
            &test_collection(),
            4,
            dir.path(),
            1,
            &policy,
            Some(Instant::now() + Duration::from_millis(25)),
        )
        .unwrap();

        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(
            fetcher.attempts_for(0),
            1,
            "no retry may start once the deadline has passed"
        );
        assert_eq!(fetcher.attempts_for(1), 0, "leaf 1 must never be submitted");
    }

    #[test]
    fn expired_deadline_skips_unsubmitted_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(SyntheticFetcher::new(false));
        let summary = acquire_all(
            fetcher as Arc<dyn LeafFetcher>,
            &test_collection(),
            25,
            dir.path(),
            4,
            &fast_policy(),
            Some(Instant::now() - Duration::from_secs(1)),
        )
        .unwrap();
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.skipped, 25);
        assert_eq!(summary.downloaded, 0);
    }
}
