//! `leafgrab sentinel`: print the SHA-256 of one leaf response.
//!
//! Point this at an index known to be past the end of a collection and put
//! the printed digest into `sentinel_sha256` in the config.

use anyhow::{Context, Result};

use leafgrab_core::config::LeafgrabConfig;
use leafgrab_core::fetch::LeafFetcher;
use leafgrab_core::fingerprint::Fingerprint;

use super::{collection_from, fetcher_from};

pub fn run_sentinel(cfg: &LeafgrabConfig, identifier: &str, index: u64) -> Result<()> {
    let collection = collection_from(cfg, identifier)?;
    let url = collection.leaf_url(index);
    let bytes = fetcher_from(cfg)
        .fetch_bytes(&url)
        .with_context(|| format!("fetch leaf {} of {}", index, identifier))?;
    println!("{}", Fingerprint::of_bytes(&bytes));
    Ok(())
}
