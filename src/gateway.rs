//! Cached, governed access to the exchange.
//!
//! The gateway owns one governor and two caches, built explicitly from an
//! [`AppConfig`] so every component that needs them receives them by
//! reference. A fetch checks the cache, waits for budget on a miss, runs the
//! caller's request, records its weight and stores a successful result.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::governor::WeightBudgetGovernor;
use crate::logging::targets;
use crate::prelude::*;

/// Cache-then-governor flow over a single cache instance.
///
/// Errors from `request` are returned unchanged and never cached; the weight
/// they spent is still recorded.
pub async fn cached_execute<V, E, F, Fut>(
    cache: &ResponseCache<V>,
    governor: &WeightBudgetGovernor,
    key: &str,
    ttl: Option<Duration>,
    endpoint_type: &str,
    item_count: Option<usize>,
    request: F,
) -> std::result::Result<V, E>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, E>>,
{
    if let Some(value) = cache.get(key) {
        debug!(target: targets::GATEWAY, key, "Cache hit");
        return Ok(value);
    }

    debug!(target: targets::GATEWAY, key, endpoint = endpoint_type, "Cache miss - fetching");
    let value = governor.execute(endpoint_type, item_count, request).await?;
    cache.set(key, value.clone(), ttl);
    Ok(value)
}

/// Governor plus the market-data and metadata caches.
#[derive(Debug)]
pub struct ExchangeGateway {
    governor: WeightBudgetGovernor,
    market_data: ResponseCache<Value>,
    metadata: ResponseCache<Value>,
}

impl ExchangeGateway {
    pub fn new(
        governor: WeightBudgetGovernor,
        market_data: ResponseCache<Value>,
        metadata: ResponseCache<Value>,
    ) -> Self {
        Self {
            governor,
            market_data,
            metadata,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            WeightBudgetGovernor::new(config.rate_limit.clone())?,
            ResponseCache::new(config.market_cache.clone())?,
            ResponseCache::new(config.metadata_cache.clone())?,
        ))
    }

    pub fn governor(&self) -> &WeightBudgetGovernor {
        &self.governor
    }

    pub fn market_data(&self) -> &ResponseCache<Value> {
        &self.market_data
    }

    pub fn metadata(&self) -> &ResponseCache<Value> {
        &self.metadata
    }

    /// Fetch through the short-TTL cache (prices, books).
    pub async fn fetch_market_data<E, F, Fut>(
        &self,
        key: &str,
        endpoint_type: &str,
        item_count: Option<usize>,
        request: F,
    ) -> std::result::Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
    {
        cached_execute(
            &self.market_data,
            &self.governor,
            key,
            None,
            endpoint_type,
            item_count,
            request,
        )
        .await
    }

    /// Fetch through the long-TTL cache (meta, asset contexts).
    pub async fn fetch_metadata<E, F, Fut>(
        &self,
        key: &str,
        endpoint_type: &str,
        request: F,
    ) -> std::result::Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
    {
        cached_execute(
            &self.metadata,
            &self.governor,
            key,
            None,
            endpoint_type,
            None,
            request,
        )
        .await
    }
}
