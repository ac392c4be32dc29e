#![deny(unreachable_pub)]

// Core modules
mod consts;
mod errors;
mod prelude;

// Feature modules
pub mod cache;
pub mod config;
pub mod gateway;
pub mod governor;
pub mod logging;

// Re-exports
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use config::AppConfig;
pub use consts::{
    endpoints, BACKOFF_SAFETY_MARGIN, CANDLE_ITEMS_PER_WEIGHT, DEFAULT_ENDPOINT_KEY,
    DEFAULT_ENDPOINT_WEIGHT, HYPERLIQUID_BUDGET_PER_WINDOW, HYPERLIQUID_WINDOW_MS,
    LIGHT_READ_WEIGHT, USER_ROLE_WEIGHT,
};
pub use errors::Error;
pub use gateway::{cached_execute, ExchangeGateway};
pub use governor::{
    GovernorMetrics, PrioritySession, RateLimiterConfig, WeightBudgetGovernor, WeightEntry,
};
pub use logging::{init_logging, LogConfig, LogFormat};
