//! Quote Check
//!
//! Read-only check: for every configured pair, print both venues' balances,
//! the exchange price, the chain quote for the would-be trade size and the
//! decision the engine would take. Signs nothing, sends nothing.
//!
//! Usage:
//!   cargo run --bin quote-check -- --env-file .env --pairs pairs.toml

use anyhow::Result;
use cexarb_bot::arbitrage::{decide, round_quantity, size_trade, ArbEngine};
use cexarb_bot::config::load_config_from_file;
use cexarb_bot::types::{ChainSide, PairConfig};
use clap::Parser;
use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "quote-check")]
struct Args {
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    env_file: String,

    #[arg(long, env = "PAIRS_FILE", default_value = "pairs.toml")]
    pairs: String,

    /// Only check this exchange ticker
    #[arg(long)]
    ticker: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = load_config_from_file(&args.env_file, &args.pairs)?;
    config.live_mode = false;
    let engine = ArbEngine::from_config(&config)?;

    info!("===========================================");
    info!("   Quote Check ({})", engine.address());
    info!("===========================================");

    // read-only, so pairs are checked concurrently
    let pairs: Vec<&PairConfig> = config
        .pairs
        .iter()
        .filter(|pair| {
            args.ticker
                .as_deref()
                .map_or(true, |t| t.eq_ignore_ascii_case(&pair.exchange_ticker))
        })
        .collect();
    join_all(pairs.into_iter().map(|pair| check_pair(&engine, pair))).await;

    Ok(())
}

async fn check_pair(engine: &ArbEngine, pair: &PairConfig) {
    let ticker = &pair.exchange_ticker;
    let balances = match engine.reader().balances(pair).await {
        Ok(b) => b,
        Err(e) => {
            warn!("{}: balances unavailable: {}", ticker, e);
            return;
        }
    };
    let exchange_price = match engine.reader().exchange_price(pair).await {
        Ok(p) => p,
        Err(e) => {
            warn!("{}: exchange price unavailable: {}", ticker, e);
            return;
        }
    };
    info!("{} | balances: {}", ticker, balances);
    info!("{} | exchange price: {}", ticker, exchange_price);

    let size = match size_trade(&balances, exchange_price) {
        Ok(size) => round_quantity(size, pair.quantity_precision),
        Err(e) => {
            warn!("{}: cannot size a trade: {}", ticker, e);
            return;
        }
    };

    match engine.resolver().resolve(pair, ChainSide::SellBase, size).await {
        Ok(quote) => {
            info!(
                "{} | chain price for {} {}: {} via {} split(s)",
                ticker,
                size,
                pair.base_symbol,
                quote.price,
                quote.route.splits.len()
            );
            match decide(exchange_price, quote.price, pair.risk_factor) {
                Some(direction) => info!("{} | would trade: {}", ticker, direction),
                None => info!("{} | no opportunity at risk factor {}", ticker, pair.risk_factor),
            }
        }
        Err(e) => warn!("{}: chain quote failed: {}", ticker, e),
    }
}
