//! `leafgrab discover`: boundary discovery only.

use anyhow::Result;

use leafgrab_core::config::LeafgrabConfig;
use leafgrab_core::discover;

use super::{collection_from, fetcher_from};

pub fn run_discover(cfg: &LeafgrabConfig, identifier: &str, upper_bound: Option<u64>) -> Result<()> {
    let collection = collection_from(cfg, identifier)?;
    let sentinel = cfg.sentinel()?;
    let policy = cfg.retry_policy();

    let boundary = discover::discover_boundary(
        &fetcher_from(cfg),
        &collection,
        &sentinel,
        &policy,
        upper_bound.unwrap_or(cfg.search_upper_bound),
        policy.base_delay,
    );
    println!("{}", boundary);
    Ok(())
}
