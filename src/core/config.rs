//! Reader configuration.
//!
//! Loaded from JSON or from `AHDS_*` environment variables. Unset values
//! fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::LoadPolicy;
use crate::util::{Error, Result};

/// Default scanner chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

pub const ENV_POLICY: &str = "AHDS_STREAM_POLICY";
pub const ENV_CHUNK_SIZE: &str = "AHDS_CHUNK_SIZE";
pub const ENV_MMAP: &str = "AHDS_MMAP";

/// Options controlling how a data file is opened and scanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// When stream payloads are read
    pub policy: LoadPolicy,
    /// Bytes pulled from the source per scanner refill
    pub chunk_size: usize,
    /// Memory-map files instead of buffered reads
    pub use_mmap: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            policy: LoadPolicy::OnDemand,
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_mmap: false,
        }
    }
}

impl ReaderConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Defaults overridden by `AHDS_STREAM_POLICY`, `AHDS_CHUNK_SIZE` and `AHDS_MMAP`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(policy) = lookup(ENV_POLICY) {
            config.policy = policy.parse()?;
        }
        if let Some(size) = lookup(ENV_CHUNK_SIZE) {
            config.chunk_size = size
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{}={} is not a byte count", ENV_CHUNK_SIZE, size)))?;
        }
        if let Some(mmap) = lookup(ENV_MMAP) {
            config.use_mmap = matches!(mmap.trim(), "1" | "true" | "yes" | "on");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }
        Ok(())
    }
}
