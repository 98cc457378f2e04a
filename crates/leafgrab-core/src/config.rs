use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fingerprint::Fingerprint;
use crate::retry::RetryPolicy;

/// SHA-256 of the placeholder body the archive serves for leaves past the
/// end of a collection.
const DEFAULT_SENTINEL_SHA256: &str =
    "c94b9a75e0b9d80dcce1a668c56d1172ac6c5e3279be2e62fc25bd01cf261c82";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 0.5,
            max_delay_secs: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/leafgrab/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafgrabConfig {
    /// Maximum concurrent leaf fetches during the bulk phase.
    pub concurrency_cap: usize,
    /// Upper bound handed to boundary discovery; collections longer than
    /// this are under-reported, so choose generously.
    pub search_upper_bound: u64,
    /// Archive server base URL.
    pub server: String,
    /// Path prefix the collection lives under on the server.
    pub item_path_prefix: String,
    /// Hex SHA-256 of the "missing leaf" placeholder body.
    pub sentinel_sha256: String,
    /// Connect timeout per fetch attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Hard timeout per fetch attempt, in seconds.
    pub attempt_timeout_secs: u64,
    /// Optional overall deadline for a bulk run, in seconds (None = no limit).
    #[serde(default)]
    pub overall_deadline_secs: Option<u64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for LeafgrabConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: 40,
            search_upper_bound: 20_000,
            server: "https://ia802306.us.archive.org".to_string(),
            item_path_prefix: "/12/items".to_string(),
            sentinel_sha256: DEFAULT_SENTINEL_SHA256.to_string(),
            connect_timeout_secs: 15,
            attempt_timeout_secs: 120,
            overall_deadline_secs: None,
            retry: None,
        }
    }
}

impl LeafgrabConfig {
    /// Retry policy from the optional `[retry]` section, or defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            },
            None => RetryPolicy::default(),
        }
    }

    /// Parsed sentinel fingerprint.
    pub fn sentinel(&self) -> Result<Fingerprint> {
        self.sentinel_sha256.parse()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("leafgrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LeafgrabConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LeafgrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LeafgrabConfig = toml::from_str(&data)?;
    Ok(cfg)
}
