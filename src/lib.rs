//! CEX/AMM Arbitrage Bot Library
//!
//! Trades the spread between a centralized exchange spot market and an AMM
//! chain. The chain leg is a split-route swap wrapped in a top-of-block
//! auction bid; the exchange leg is a market order placed once the swap has
//! committed.

pub mod arbitrage;
pub mod chain;
pub mod config;
pub mod error;
pub mod exchange;
pub mod journal;
pub mod types;
pub mod units;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use arbitrage::{ArbEngine, Scheduler};
pub use config::{load_config_from_file, BotConfig};
pub use error::{ArbError, ArbResult};
pub use types::{Direction, PairConfig, RunOutcome, TradeReport};
