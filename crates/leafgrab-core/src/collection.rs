//! Leaf endpoint URL model.
//!
//! A collection is a paginated sequence of leaves addressed by an integer
//! index. Both discovery probes and bulk fetches go through `leaf_url` so
//! "existence" is decided against exactly the same endpoint shape (same
//! query parameters) in both phases.

use anyhow::{Context, Result};
use url::Url;

const PREVIEW_ENDPOINT: &str = "/BookReader/BookReaderPreview.php";

/// A remote leaf collection: identifier plus the server and item path it
/// lives under.
#[derive(Debug, Clone)]
pub struct Collection {
    identifier: String,
    base: Url,
    item_path_prefix: String,
}

impl Collection {
    /// Builds a collection handle. `server` must be an absolute URL with a
    /// host (e.g. `https://ia802306.us.archive.org`).
    pub fn new(identifier: &str, server: &str, item_path_prefix: &str) -> Result<Self> {
        if identifier.is_empty() {
            anyhow::bail!("collection identifier must not be empty");
        }
        let base = Url::parse(server).with_context(|| format!("invalid server URL: {}", server))?;
        if base.host_str().is_none() {
            anyhow::bail!("server URL has no host: {}", server);
        }
        Ok(Self {
            identifier: identifier.to_string(),
            base,
            item_path_prefix: item_path_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// URL of the preview endpoint for one leaf index.
    pub fn leaf_url(&self, index: u64) -> String {
        let mut u = self.base.clone();
        u.set_path(PREVIEW_ENDPOINT);
        // Host was checked in `new`.
        let host = u.host_str().unwrap_or_default().to_string();
        u.query_pairs_mut()
            .append_pair("id", &self.identifier)
            .append_pair("subPrefix", &self.identifier)
            .append_pair(
                "itemPath",
                &format!("{}/{}", self.item_path_prefix, self.identifier),
            )
            .append_pair("server", &host)
            .append_pair("page", &format!("leaf{}", index))
            .append_pair("fail", "preview")
            .append_pair("scale", "1")
            .append_pair("rotate", "0");
        u.to_string()
    }

    /// Local filename for a downloaded leaf.
    pub fn leaf_filename(&self, index: u64) -> String {
        format!("leaf{}.jpeg", index)
    }
}
