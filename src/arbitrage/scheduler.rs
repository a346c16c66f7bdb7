//! Per-pair scheduler
//!
//! One task per configured pair, each ticking on its own interval. Runs are
//! still serialized by the engine's pipeline lock. Shutdown is only observed
//! between runs, so an in-flight bundle always reaches its confirmation step.

use super::pipeline::ArbEngine;
use crate::error::ArbResult;
use crate::types::{PairConfig, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub struct Scheduler {
    engine: Arc<ArbEngine>,
    pairs: Vec<PairConfig>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<ArbEngine>, pairs: Vec<PairConfig>, interval: Duration) -> Self {
        Self {
            engine,
            pairs,
            interval,
        }
    }

    /// A single pass over every pair, in configuration order
    pub async fn run_once(&self) -> Vec<(String, ArbResult<RunOutcome>)> {
        let mut results = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            let result = self.engine.run_pair(pair).await;
            log_outcome(&pair.exchange_ticker, &result);
            results.push((pair.exchange_ticker.clone(), result));
        }
        results
    }

    /// Start one ticking task per pair. Each stops after its current run once
    /// `shutdown` flips to true (or its sender is dropped).
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for pair in self.pairs {
            let engine = self.engine.clone();
            let mut shutdown = shutdown.clone();
            let interval = self.interval;
            set.spawn(async move {
                info!("Starting scheduler for {} (every {:?})", pair.exchange_ticker, interval);
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                            continue;
                        }
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                    let result = engine.run_pair(&pair).await;
                    log_outcome(&pair.exchange_ticker, &result);
                }
                info!("Scheduler for {} stopped", pair.exchange_ticker);
            });
        }
        set
    }
}

pub fn log_outcome(ticker: &str, result: &ArbResult<RunOutcome>) {
    match result {
        Ok(RunOutcome::NoOpportunity) => {}
        Ok(RunOutcome::DryRun {
            direction,
            size,
            swap_hash,
        }) => info!(
            "🧪 [DRY RUN] {} {} size {} (swap {} signed, not sent)",
            ticker, direction, size, swap_hash
        ),
        Ok(RunOutcome::Unconfirmed {
            direction,
            swap_hash,
        }) => warn!("{} {}: swap {} unconfirmed", ticker, direction, swap_hash),
        Ok(RunOutcome::Executed(report)) => info!(
            "✅ {} {} size {} | exchange {} | chain {} | swap {} @ {}",
            ticker,
            report.direction,
            report.size,
            report.exchange_price,
            report.chain_price,
            report.swap_hash,
            report.height
        ),
        Err(e) if e.is_transient() => warn!("{} run failed (transient): {}", ticker, e),
        Err(e) => error!("❌ {} run failed: {}", ticker, e),
    }
}
