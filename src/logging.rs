//! Structured logging setup.
//!
//! Stdout logging with a selectable format, plus an optional daily-rotated
//! JSON file via tracing-appender.
//!
//! # Component Targets
//!
//! | Target | Description |
//! |--------|-------------|
//! | `hyperliquid_governor::governor` | Admission, backoff, priority lock |
//! | `hyperliquid_governor::cache` | Cache sweeps and capacity pressure |
//! | `hyperliquid_governor::gateway` | Cache-then-governor fetch flow |
//!
//! ```bash
//! # Debug only admission decisions
//! RUST_LOG=hyperliquid_governor::governor=debug cargo run --bin budget_sim
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::prelude::*;
use crate::Error;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format with colors (default for development)
    #[default]
    Pretty,
    /// JSON format (best for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Format for stdout logging
    #[serde(default)]
    pub stdout_format: LogFormat,

    /// Directory for the rotated JSON log file; no file logging when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            stdout_format: LogFormat::default(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// JSON stdout plus a rotated file in `log_dir`.
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            stdout_format: LogFormat::Json,
            log_dir: Some(log_dir),
            ..Default::default()
        }
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(level).map_err(|e| Error::Logging(e.to_string()))?;
    for directive in ["hyper=warn", "reqwest=warn"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e: tracing_subscriber::filter::ParseError| {
                    Error::Logging(e.to_string())
                })?,
        );
    }
    Ok(filter)
}

/// Filter used when `RUST_LOG` is unset or unparseable.
fn fallback_directives<'a>(
    config: &'a LogConfig,
    env_filter_override: Option<&'a str>,
) -> &'a str {
    env_filter_override.unwrap_or(&config.level)
}

/// Initialize logging based on configuration.
///
/// `RUST_LOG` wins when set; otherwise `env_filter_override` (e.g. a CLI
/// flag), then `config.level`.
///
/// Returns the file writer guard, which must be kept alive for the duration
/// of the program so buffered lines are flushed.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Option<WorkerGuard>> {
    let stdout_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(fallback_directives(config, env_filter_override))?,
    };

    let stdout_layer = match config.stdout_format {
        LogFormat::Json => fmt::layer().json().with_filter(stdout_filter).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_filter(stdout_filter).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_filter(stdout_filter)
            .boxed(),
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|e| Error::Logging(e.to_string()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "governor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .with_filter(build_filter(&config.level)?)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(guard)
}

/// Log target constants for component-specific logging.
///
/// ```ignore
/// tracing::debug!(target: targets::GOVERNOR, weight, "Budget available");
/// ```
pub mod targets {
    /// Admission control and the priority lock
    pub const GOVERNOR: &str = "hyperliquid_governor::governor";
    /// Response caches
    pub const CACHE: &str = "hyperliquid_governor::cache";
    /// Cached, governed fetches
    pub const GATEWAY: &str = "hyperliquid_governor::gateway";
}
