//! Governor configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{
    endpoints, CANDLE_ITEMS_PER_WEIGHT, DEFAULT_ENDPOINT_KEY, DEFAULT_ENDPOINT_WEIGHT,
    HYPERLIQUID_BUDGET_PER_WINDOW, HYPERLIQUID_WINDOW_MS, LIGHT_READ_WEIGHT, USER_ROLE_WEIGHT,
};
use crate::prelude::*;
use crate::Error;

/// Configuration for the weight budget governor.
///
/// Set once at construction; the governor never mutates it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimiterConfig {
    /// Total weight allowed per rolling window (default: 1200)
    #[serde(default = "default_budget_per_window")]
    pub budget_per_window: u32,

    /// Rolling window length in milliseconds (default: 60000)
    #[serde(default = "default_window_duration_ms")]
    pub window_duration_ms: u64,

    /// Base weight per endpoint type. Must contain a `"default"` entry.
    #[serde(default = "hyperliquid_endpoint_weights")]
    pub endpoint_weights: HashMap<String, u32>,

    /// Utilization fraction above which the governor warns (default: 0.8)
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

fn default_budget_per_window() -> u32 {
    HYPERLIQUID_BUDGET_PER_WINDOW
}

fn default_window_duration_ms() -> u64 {
    HYPERLIQUID_WINDOW_MS
}

fn default_warning_threshold() -> f64 {
    0.8
}

fn hyperliquid_endpoint_weights() -> HashMap<String, u32> {
    let light = [
        endpoints::ALL_MIDS,
        endpoints::L2_BOOK,
        endpoints::CLEARINGHOUSE_STATE,
        endpoints::SPOT_CLEARINGHOUSE_STATE,
        endpoints::ORDER_STATUS,
        endpoints::EXCHANGE_STATUS,
    ];
    let standard = [
        endpoints::META,
        endpoints::META_AND_ASSET_CTXS,
        endpoints::CANDLE_SNAPSHOT,
        DEFAULT_ENDPOINT_KEY,
    ];

    let mut weights: HashMap<String, u32> = light
        .iter()
        .map(|name| (name.to_string(), LIGHT_READ_WEIGHT))
        .collect();
    weights.extend(
        standard
            .iter()
            .map(|name| (name.to_string(), DEFAULT_ENDPOINT_WEIGHT)),
    );
    weights.insert(endpoints::USER_ROLE.to_string(), USER_ROLE_WEIGHT);
    weights
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::hyperliquid()
    }
}

impl RateLimiterConfig {
    /// Hyperliquid IP limits: 1200 weight per minute.
    pub fn hyperliquid() -> Self {
        Self {
            budget_per_window: default_budget_per_window(),
            window_duration_ms: default_window_duration_ms(),
            endpoint_weights: hyperliquid_endpoint_weights(),
            warning_threshold: default_warning_threshold(),
        }
    }

    /// Build a config with a single default weight for every endpoint.
    pub fn new(budget_per_window: u32, window_duration_ms: u64, default_weight: u32) -> Self {
        let mut endpoint_weights = HashMap::new();
        endpoint_weights.insert(DEFAULT_ENDPOINT_KEY.to_string(), default_weight);
        Self {
            budget_per_window,
            window_duration_ms,
            endpoint_weights,
            warning_threshold: default_warning_threshold(),
        }
    }

    /// Add or replace the base weight of one endpoint type.
    pub fn with_endpoint_weight(mut self, endpoint: impl Into<String>, weight: u32) -> Self {
        self.endpoint_weights.insert(endpoint.into(), weight);
        self
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_duration_ms)
    }

    /// Base weight of the fallback entry, if configured.
    pub fn default_weight(&self) -> Option<u32> {
        self.endpoint_weights.get(DEFAULT_ENDPOINT_KEY).copied()
    }

    /// Weight of one request to `endpoint`.
    ///
    /// `candleSnapshot` is charged one extra unit per 60 items, rounded up.
    pub fn weight_for(&self, endpoint: &str, item_count: Option<usize>) -> u32 {
        let base = self
            .endpoint_weights
            .get(endpoint)
            .copied()
            .or_else(|| self.default_weight())
            .unwrap_or(DEFAULT_ENDPOINT_WEIGHT);

        if endpoint != endpoints::CANDLE_SNAPSHOT {
            return base;
        }

        let extra = item_count.map_or(0, |n| n.div_ceil(CANDLE_ITEMS_PER_WEIGHT));
        base.saturating_add(u32::try_from(extra).unwrap_or(u32::MAX))
    }

    /// Check that the config can drive a governor.
    pub fn validate(&self) -> Result<()> {
        if self.budget_per_window == 0 {
            return Err(Error::invalid_config("budget_per_window must be > 0"));
        }
        if self.window_duration_ms == 0 {
            return Err(Error::invalid_config("window_duration_ms must be > 0"));
        }
        if self.default_weight().is_none() {
            return Err(Error::invalid_config(format!(
                "endpoint_weights must contain a \"{DEFAULT_ENDPOINT_KEY}\" entry"
            )));
        }
        if let Some((name, _)) = self.endpoint_weights.iter().find(|(_, w)| **w == 0) {
            return Err(Error::invalid_config(format!(
                "endpoint weight for \"{name}\" must be > 0"
            )));
        }
        if !(self.warning_threshold > 0.0 && self.warning_threshold <= 1.0) {
            return Err(Error::invalid_config(format!(
                "warning_threshold must be in (0, 1], got {}",
                self.warning_threshold
            )));
        }
        Ok(())
    }
}
