//! Subcommand implementations.

mod discover;
mod grab;
mod sentinel;

pub use discover::run_discover;
pub use grab::run_grab;
pub use sentinel::run_sentinel;

use leafgrab_core::collection::Collection;
use leafgrab_core::config::LeafgrabConfig;
use leafgrab_core::fetch::HttpFetcher;

/// Collection handle from config plus identifier.
fn collection_from(cfg: &LeafgrabConfig, identifier: &str) -> anyhow::Result<Collection> {
    Collection::new(identifier, &cfg.server, &cfg.item_path_prefix)
}

/// HTTP fetcher with the configured timeouts.
fn fetcher_from(cfg: &LeafgrabConfig) -> HttpFetcher {
    HttpFetcher::new(cfg.connect_timeout(), cfg.attempt_timeout())
}
