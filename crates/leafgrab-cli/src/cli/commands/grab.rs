//! `leafgrab grab`: discovery followed by bulk acquisition.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use leafgrab_core::acquire;
use leafgrab_core::config::LeafgrabConfig;
use leafgrab_core::discover;
use leafgrab_core::fetch::LeafFetcher;

use super::{collection_from, fetcher_from};

pub fn run_grab(
    cfg: &LeafgrabConfig,
    identifier: &str,
    out_dir: Option<PathBuf>,
    concurrency: Option<usize>,
    upper_bound: Option<u64>,
) -> Result<()> {
    let collection = collection_from(cfg, identifier)?;
    let sentinel = cfg.sentinel()?;
    let policy = cfg.retry_policy();
    let http = fetcher_from(cfg);

    let boundary = discover::discover_boundary(
        &http,
        &collection,
        &sentinel,
        &policy,
        upper_bound.unwrap_or(cfg.search_upper_bound),
        policy.base_delay,
    );
    println!("{}: {} leaves", identifier, boundary);

    let dest_dir = out_dir.unwrap_or_else(|| PathBuf::from(".")).join(identifier);
    let deadline = cfg
        .overall_deadline_secs
        .map(|s| Instant::now() + Duration::from_secs(s));

    let summary = acquire::acquire_all(
        Arc::new(http) as Arc<dyn LeafFetcher>,
        &collection,
        boundary,
        &dest_dir,
        concurrency.unwrap_or(cfg.concurrency_cap),
        &policy,
        deadline,
    )?;

    tracing::info!(
        identifier,
        downloaded = summary.downloaded,
        failed = summary.failed,
        "grab finished"
    );
    println!(
        "downloaded {} of {} leaves into {} ({} failed, {} skipped)",
        summary.downloaded,
        summary.submitted,
        dest_dir.display(),
        summary.failed,
        summary.skipped,
    );
    Ok(())
}
