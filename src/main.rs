//! CEX/AMM Arbitrage Bot
//!
//! Main entry point. Loads the env file and pair list, wires the exchange,
//! chain and router clients into one engine, then runs one scheduler task
//! per pair until Ctrl-C. Shutdown waits for in-flight runs to finish.

use anyhow::Result;
use cexarb_bot::arbitrage::{ArbEngine, Scheduler};
use cexarb_bot::config::load_config_from_file;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// CEX/AMM arbitrage bot (exchange spot vs chain swap via top-of-block auction)
#[derive(Parser)]
#[command(name = "cexarb-bot")]
struct Args {
    /// Env file with endpoints and secrets
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    env_file: String,

    /// TOML file with one [[pair]] table per asset pair
    #[arg(long, env = "PAIRS_FILE", default_value = "pairs.toml")]
    pairs: String,

    /// Broadcast bundles and place exchange orders (overrides LIVE_MODE)
    #[arg(long)]
    live: bool,

    /// Run every pair once and exit
    #[arg(long)]
    once: bool,

    /// Log output: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format.eq_ignore_ascii_case("json"));

    info!("CEX/AMM Arbitrage Bot Starting...");

    let mut config = load_config_from_file(&args.env_file, &args.pairs)?;
    if args.live {
        config.live_mode = true;
    }
    info!("Configuration loaded from {} (chain_id: {})", args.env_file, config.chain_id);
    info!("LCD: {} | SQS: {}", config.lcd_url, config.sqs_url);
    info!("Trading pairs: {}", config.pairs.len());
    for pair in &config.pairs {
        info!(
            "  {} | {} / {} | risk factor {}",
            pair.exchange_ticker, pair.base_denom, pair.quote_denom, pair.risk_factor
        );
    }

    let engine = Arc::new(ArbEngine::from_config(&config)?);
    info!("Signer address: {}", engine.address());
    if engine.is_live() {
        warn!("LIVE TRADING MODE ENABLED - REAL MONEY AT RISK!");
    } else {
        info!("Engine initialized (DRY RUN mode)");
    }

    let scheduler = Scheduler::new(engine.clone(), config.pairs.clone(), config.check_interval());

    if args.once {
        let results = scheduler.run_once().await;
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(
            "Single pass complete: {} pairs, {} failed, {} executed",
            results.len(),
            failed,
            engine.stats().executed()
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = scheduler.spawn(shutdown_rx);
    info!("🚀 Scheduler running, check interval {:?}", config.check_interval());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for in-flight runs...");
    shutdown_tx.send(true)?;

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Scheduler task failed: {}", e);
        }
    }

    let stats = engine.stats();
    info!(
        "Stopped after {} runs: {} opportunities, {} executed",
        stats.runs(),
        stats.opportunities(),
        stats.executed()
    );
    Ok(())
}
