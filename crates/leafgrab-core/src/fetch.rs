//! HTTP transport for leaf retrieval (curl Easy handles).
//!
//! Two operations: fetch a leaf fully into memory (discovery probes hash the
//! bytes and throw them away) and fetch straight to a file (bulk phase).
//! Both follow redirects and carry per-attempt connect/transfer timeouts.
//! Errors stay typed so the retry layer can classify them before anything is
//! converted to anyhow.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Suffix for in-progress downloads; renamed away on success so a partial
/// body never sits at the final path.
pub const TEMP_SUFFIX: &str = ".part";

/// Error from a single fetch attempt (curl failure, HTTP error, or local
/// write failure).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Local file write failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

/// Transport seam shared by discovery and the bulk scheduler. Implemented
/// over libcurl in production and by synthetic fetchers in tests.
pub trait LeafFetcher: Send + Sync {
    /// Retrieve a resource fully into memory.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Retrieve a resource and persist it at `dest`. No file is left at
    /// `dest` on failure.
    fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Path for the in-progress file: appends `.part` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Production fetcher over libcurl.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    connect_timeout: Duration,
    attempt_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration, attempt_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            attempt_timeout,
        }
    }

    fn handle(&self, url: &str) -> Result<curl::easy::Easy, FetchError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.attempt_timeout)?;
        Ok(easy)
    }
}

impl LeafFetcher for HttpFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut easy = self.handle(url)?;
        let mut body: Vec<u8> = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        Ok(body)
    }

    fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let tmp = temp_path(dest);
        let mut easy = self.handle(url)?;
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let mut write_err: Option<std::io::Error> = None;

        let perform_result;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match writer.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_err = Some(e);
                    // Abort the transfer; curl surfaces this as a write error.
                    Ok(0)
                }
            })?;
            perform_result = transfer.perform();
        }

        if let Err(e) = perform_result {
            let _ = fs::remove_file(&tmp);
            if e.is_write_error() {
                if let Some(io_err) = write_err.take() {
                    return Err(FetchError::Storage(io_err));
                }
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            let _ = fs::remove_file(&tmp);
            return Err(FetchError::Http(code));
        }

        if let Err(e) = writer.flush() {
            let _ = fs::remove_file(&tmp);
            return Err(FetchError::Storage(e));
        }
        drop(writer);
        if let Err(e) = fs::rename(&tmp, dest) {
            let _ = fs::remove_file(&tmp);
            return Err(FetchError::Storage(e));
        }
        Ok(())
    }
}
