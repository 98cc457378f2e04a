//! SHA-256 content fingerprints.
//!
//! The archive returns a fixed placeholder body (HTTP 200) for leaf indices
//! past the end of a collection, so existence cannot be read off the status
//! code. Discovery fetches the leaf, fingerprints the bytes, and compares
//! against the known placeholder fingerprint instead.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// A SHA-256 digest. Equality against the configured sentinel is the only
/// comparison discovery performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of an in-memory byte slice (probe responses).
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Fingerprint(hasher.finalize().into())
    }

    /// Fingerprint of a file on disk, read in chunks to keep memory bounded.
    pub fn of_path(path: &Path) -> Result<Self> {
        let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; BUF_SIZE];
        loop {
            let n = f
                .read(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Fingerprint(hasher.finalize().into()))
    }

    /// Digest as lowercase hex, the form used in config files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).context("fingerprint is not valid hex")?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("fingerprint must be 32 bytes (64 hex chars)"))?;
        Ok(Fingerprint(arr))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
