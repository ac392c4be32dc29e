//! Weight budget governor.
//!
//! Every request to the exchange passes through here:
//!
//! - `config`: budget, window and per-endpoint weights
//! - `history`: rolling record of spent weight
//! - `priority`: broadcast lock giving one session exclusive right-of-way
//! - `limiter`: admission control, backoff and the `execute` wrappers

mod config;
mod history;
mod limiter;
mod priority;

#[cfg(test)]
mod tests;

pub use config::*;
pub use history::WeightEntry;
pub use limiter::*;
