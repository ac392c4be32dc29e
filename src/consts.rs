//! Hyperliquid rate-limit constants.
//!
//! IP weight limits per the Hyperliquid docs:
//! - 1200 weight per rolling minute
//! - `l2Book`, `allMids`, `clearinghouseState`, `orderStatus`,
//!   `spotClearinghouseState`, `exchangeStatus`: weight 2
//! - `userRole`: weight 60
//! - all other info requests: weight 20
//! - `candleSnapshot`: one extra unit per 60 items returned

use std::time::Duration;

/// IP weight budget per window.
pub const HYPERLIQUID_BUDGET_PER_WINDOW: u32 = 1200;

/// Rolling window length in milliseconds.
pub const HYPERLIQUID_WINDOW_MS: u64 = 60_000;

/// Weight charged for unmapped endpoints.
pub const DEFAULT_ENDPOINT_WEIGHT: u32 = 20;

/// Weight of the cheap info reads.
pub const LIGHT_READ_WEIGHT: u32 = 2;

/// Weight of the `userRole` read.
pub const USER_ROLE_WEIGHT: u32 = 60;

/// Items per extra weight unit on `candleSnapshot`.
pub const CANDLE_ITEMS_PER_WEIGHT: usize = 60;

/// Margin added to computed backoff sleeps so the freed entry has
/// actually left the window when the caller wakes.
pub const BACKOFF_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// Key in the endpoint weight table used for unknown endpoints.
pub const DEFAULT_ENDPOINT_KEY: &str = "default";

/// Info request type names as sent in the `type` field.
pub mod endpoints {
    pub const ALL_MIDS: &str = "allMids";
    pub const L2_BOOK: &str = "l2Book";
    pub const CLEARINGHOUSE_STATE: &str = "clearinghouseState";
    pub const SPOT_CLEARINGHOUSE_STATE: &str = "spotClearinghouseState";
    pub const ORDER_STATUS: &str = "orderStatus";
    pub const EXCHANGE_STATUS: &str = "exchangeStatus";
    pub const USER_ROLE: &str = "userRole";
    pub const META: &str = "meta";
    pub const META_AND_ASSET_CTXS: &str = "metaAndAssetCtxs";
    pub const CANDLE_SNAPSHOT: &str = "candleSnapshot";
}
