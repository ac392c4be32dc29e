//! Application config file.
//!
//! ```toml
//! [rate_limit]
//! budget_per_window = 1200
//! window_duration_ms = 60000
//!
//! [market_cache]
//! default_ttl_ms = 2000
//! max_entries = 500
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::governor::RateLimiterConfig;
use crate::logging::LogConfig;
use crate::prelude::*;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,
    #[serde(default = "CacheConfig::market_data")]
    pub market_cache: CacheConfig,
    #[serde(default = "CacheConfig::metadata")]
    pub metadata_cache: CacheConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimiterConfig::default(),
            market_cache: CacheConfig::market_data(),
            metadata_cache: CacheConfig::metadata(),
            logging: LogConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIo(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigSerialize(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| Error::ConfigIo(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;
        self.market_cache.validate()?;
        self.metadata_cache.validate()?;
        Ok(())
    }
}
