//! Request budget simulator.
//!
//! Drives the governor and caches with synthetic traffic shaped like a live
//! dashboard: several pollers hitting cheap market-data reads, plus a
//! periodic dealer cycle that takes the priority lock for its account and
//! candle reads. No network calls are made; each request is a short sleep.
//!
//! ```bash
//! budget_sim generate-config -o governor.toml
//! budget_sim --config governor.toml run --duration-secs 120 --pollers 8
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{info, warn};

use hyperliquid_governor::{endpoints, init_logging, AppConfig, Error, ExchangeGateway};

#[derive(Parser)]
#[command(name = "budget_sim")]
#[command(version, about = "Hyperliquid request budget simulator", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "governor.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GOVERNOR_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "governor.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the simulation (default)
    Run {
        /// How long to run before stopping
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,

        /// Number of concurrent market-data pollers
        #[arg(long, default_value_t = 4)]
        pollers: usize,

        /// Delay between polls per poller, in milliseconds
        #[arg(long, default_value_t = 250)]
        poll_interval_ms: u64,

        /// Seconds between dealer cycles
        #[arg(long, default_value_t = 5)]
        dealer_cycle_secs: u64,

        /// Candles requested per dealer cycle
        #[arg(long, default_value_t = 240)]
        candles: usize,
    },
}

struct SimParams {
    duration: Duration,
    pollers: usize,
    poll_interval: Duration,
    dealer_cycle: Duration,
    candles: usize,
}

const COINS: [&str; 4] = ["BTC", "ETH", "SOL", "HYPE"];
const SIMULATED_LATENCY: Duration = Duration::from_millis(40);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let params = match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            AppConfig::default().save(output)?;
            println!("Sample config written to {output}");
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = AppConfig::load(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run {
            duration_secs,
            pollers,
            poll_interval_ms,
            dealer_cycle_secs,
            candles,
        }) => SimParams {
            duration: Duration::from_secs(*duration_secs),
            pollers: *pollers,
            poll_interval: Duration::from_millis(*poll_interval_ms),
            dealer_cycle: Duration::from_secs(*dealer_cycle_secs),
            candles: *candles,
        },
        None => SimParams {
            duration: Duration::from_secs(60),
            pollers: 4,
            poll_interval: Duration::from_millis(250),
            dealer_cycle: Duration::from_secs(5),
            candles: 240,
        },
    };

    let config = AppConfig::load(&cli.config)?;
    config.validate()?;
    let _log_guard = init_logging(&config.logging, cli.log_level.as_deref())?;

    let gateway = Arc::new(ExchangeGateway::from_config(&config)?);
    info!(
        budget = config.rate_limit.budget_per_window,
        window_ms = config.rate_limit.window_duration_ms,
        pollers = params.pollers,
        duration_secs = params.duration.as_secs(),
        "Starting budget simulation"
    );

    let mut tasks = JoinSet::new();
    for id in 0..params.pollers {
        tasks.spawn(run_poller(Arc::clone(&gateway), id, params.poll_interval));
    }
    tasks.spawn(run_dealer(
        Arc::clone(&gateway),
        params.dealer_cycle,
        params.candles,
    ));
    tasks.spawn(report_metrics(Arc::clone(&gateway)));

    tokio::select! {
        _ = tokio::time::sleep(params.duration) => {
            info!("Simulation duration reached");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted - shutting down");
        }
    }
    tasks.shutdown().await;

    let metrics = gateway.governor().get_metrics();
    let market = gateway.market_data().stats();
    let meta = gateway.metadata().stats();
    info!(
        admitted_immediately = metrics.admitted_immediately,
        admitted_after_backoff = metrics.admitted_after_backoff,
        priority_waits = metrics.priority_waits,
        backoff_ms_total = metrics.backoff_ms_total,
        market_hit_rate = %format!("{:.2}", market.hit_rate()),
        metadata_hit_rate = %format!("{:.2}", meta.hit_rate()),
        "Simulation finished"
    );
    Ok(())
}

async fn simulated_request(body: serde_json::Value) -> Result<serde_json::Value, Error> {
    tokio::time::sleep(SIMULATED_LATENCY).await;
    Ok(body)
}

async fn run_poller(gateway: Arc<ExchangeGateway>, id: usize, interval: Duration) {
    let mut tick = 0usize;
    loop {
        let coin = COINS[(id + tick) % COINS.len()];
        let key = format!("l2Book:{coin}");
        let book = gateway
            .fetch_market_data(&key, endpoints::L2_BOOK, None, || {
                simulated_request(json!({ "coin": coin, "levels": [[], []] }))
            })
            .await;
        if let Err(e) = book {
            warn!(poller = id, error = %e, "Book fetch failed");
        }

        if tick % 8 == 0 {
            let meta = gateway
                .fetch_metadata("meta", endpoints::META, || {
                    simulated_request(json!({ "universe": COINS }))
                })
                .await;
            if let Err(e) = meta {
                warn!(poller = id, error = %e, "Meta fetch failed");
            }
        }

        tick += 1;
        tokio::time::sleep(interval).await;
    }
}

async fn run_dealer(gateway: Arc<ExchangeGateway>, cycle: Duration, candles: usize) {
    let mut interval = tokio::time::interval(cycle);
    loop {
        interval.tick().await;

        let session = gateway.governor().priority_session();
        let state = session
            .execute(endpoints::CLEARINGHOUSE_STATE, None, || {
                simulated_request(json!({ "assetPositions": [] }))
            })
            .await;
        let candle_snapshot = session
            .execute(endpoints::CANDLE_SNAPSHOT, Some(candles), || {
                simulated_request(json!([]))
            })
            .await;
        session.release();

        if state.is_err() || candle_snapshot.is_err() {
            warn!("Dealer cycle skipped after failed read");
            continue;
        }
        info!(candles, "Dealer cycle complete");
    }
}

async fn report_metrics(gateway: Arc<ExchangeGateway>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let metrics = gateway.governor().get_metrics();
        info!(
            current_weight = metrics.current_weight,
            available = metrics.available_budget,
            utilization = %format!("{:.2}", metrics.utilization),
            priority_locked = metrics.priority_locked,
            market_entries = gateway.market_data().len(),
            "Budget status"
        );
    }
}
