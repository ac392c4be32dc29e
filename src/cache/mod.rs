//! Ephemeral response cache.
//!
//! Short-circuits repeated reads that may be served slightly stale. Two
//! independent instances are typical: a short-TTL one for prices and books,
//! a long-TTL one for metadata.

mod config;
mod store;

pub use config::*;
pub use store::*;
