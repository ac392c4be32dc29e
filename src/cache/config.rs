use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::Error;

/// Configuration for one response cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one
    pub default_ttl_ms: u64,
    /// Size at which `set` sweeps expired entries before inserting
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::market_data()
    }
}

impl CacheConfig {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            default_ttl_ms: default_ttl.as_millis() as u64,
            max_entries,
        }
    }

    /// Live prices and books: a couple of seconds of staleness at most.
    pub fn market_data() -> Self {
        Self {
            default_ttl_ms: 2_000,
            max_entries: 500,
        }
    }

    /// Asset metadata and other slowly-changing reads.
    pub fn metadata() -> Self {
        Self {
            default_ttl_ms: 300_000,
            max_entries: 100,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_ms == 0 {
            return Err(Error::invalid_config("cache default_ttl_ms must be > 0"));
        }
        if self.max_entries == 0 {
            return Err(Error::invalid_config("cache max_entries must be > 0"));
        }
        Ok(())
    }
}
