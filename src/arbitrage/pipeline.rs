//! Arbitrage Pipeline
//!
//! One run per call: snapshot → size → screening quote → decide → requote for the
//! decided direction → bundle (swap inside auction bid) → confirm → exchange
//! leg. A process-wide lock keeps runs for different pairs from overlapping,
//! since all pairs share the signer's sequence and the same balances.

use super::decision::{decide, round_quantity, size_trade, swap_input_amount};
use super::snapshot::SnapshotReader;
use crate::chain::{
    min_out_floor, BundleSettings, BundleSubmitter, ChainClient, ConfirmationTracker, LcdClient,
    RouteProvider, RouteResolver, SigningParty, SqsRouter, SwapOrder, TxStatus,
};
use crate::config::BotConfig;
use crate::error::{with_timeout, ArbError, ArbResult};
use crate::exchange::{BinanceClient, ExchangeClient};
use crate::journal::{TradeJournal, UnhedgedEntry};
use crate::types::{ChainSide, PairConfig, PriceQuote, RunOutcome, TradeReport};
use anyhow::Context;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Run counters; informational only
#[derive(Debug, Default)]
pub struct EngineStats {
    runs: AtomicU64,
    opportunities: AtomicU64,
    executed: AtomicU64,
}

impl EngineStats {
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn opportunities(&self) -> u64 {
        self.opportunities.load(Ordering::Relaxed)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

pub struct ArbEngine {
    exchange: Arc<dyn ExchangeClient>,
    reader: SnapshotReader,
    resolver: RouteResolver,
    submitter: BundleSubmitter,
    tracker: ConfirmationTracker,
    journal: Option<TradeJournal>,
    pipeline_lock: Mutex<()>,
    stats: EngineStats,
    call_timeout: Duration,
    max_slippage_bps: u32,
}

impl ArbEngine {
    pub fn new(
        config: &BotConfig,
        exchange: Arc<dyn ExchangeClient>,
        chain: Arc<dyn ChainClient>,
        router: Arc<dyn RouteProvider>,
        party: Arc<SigningParty>,
    ) -> ArbResult<Self> {
        let address = party.key.address(&config.bech32_prefix)?;
        let call_timeout = config.call_timeout();
        Ok(Self {
            reader: SnapshotReader::new(exchange.clone(), chain.clone(), address, call_timeout),
            exchange,
            resolver: RouteResolver::new(router),
            submitter: BundleSubmitter::new(
                chain.clone(),
                party,
                BundleSettings::from_config(config),
            ),
            tracker: ConfirmationTracker::new(
                chain,
                config.confirmation_delay(),
                config.confirmation_max_polls,
                call_timeout,
            ),
            journal: None,
            pipeline_lock: Mutex::new(()),
            stats: EngineStats::default(),
            call_timeout,
            max_slippage_bps: config.max_slippage_bps,
        })
    }

    /// Wire up the REST clients, keys and journal described by `config`
    pub fn from_config(config: &BotConfig) -> anyhow::Result<Self> {
        let timeout = config.call_timeout();
        let exchange = BinanceClient::new(
            &config.exchange_url,
            &config.exchange_api_key,
            &config.exchange_api_secret,
            timeout,
        )?;
        let chain = LcdClient::new(&config.lcd_url, timeout)?;
        let router = SqsRouter::new(&config.sqs_url, config.sqs_api_key.clone(), timeout)?;
        let party = SigningParty::from_hex(&config.signing_key_hex, &config.cosigner_keys_hex)
            .context("Failed to load signing keys")?;

        let mut engine = Self::new(
            config,
            Arc::new(exchange),
            Arc::new(chain),
            Arc::new(router),
            Arc::new(party),
        )?;
        if let Some(dir) = &config.journal_dir {
            engine.journal = Some(TradeJournal::new(dir)?);
            info!("Trade journal enabled: {}", dir);
        }
        Ok(engine)
    }

    pub fn with_journal(mut self, journal: TradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn address(&self) -> &str {
        self.reader.address()
    }

    pub fn is_live(&self) -> bool {
        self.submitter.is_live()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reader(&self) -> &SnapshotReader {
        &self.reader
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    /// One full pipeline run for `pair`, serialized against all other pairs.
    pub async fn run_pair(&self, pair: &PairConfig) -> ArbResult<RunOutcome> {
        let _guard = self.pipeline_lock.lock().await;
        let run = self.stats.runs.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "======= Checking {} (run #{}) at {} =======",
            pair.exchange_ticker,
            run,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        );

        let outcome = self.execute(pair).await;
        info!("Executed arbitrage count: {}", self.stats.executed());
        outcome
    }

    async fn execute(&self, pair: &PairConfig) -> ArbResult<RunOutcome> {
        let balances = self.reader.balances(pair).await?;
        info!("Balance before arb: {}", balances);

        let exchange_price = self.reader.exchange_price(pair).await?;
        let size = round_quantity(
            size_trade(&balances, exchange_price)?,
            pair.quantity_precision,
        );
        if size.is_zero() {
            return Err(ArbError::InsufficientBalance {
                base: balances.base(),
                quote: balances.quote(),
            });
        }

        let screen = self.quote(pair, ChainSide::SellBase, size).await?;
        info!(
            "Exchange price: {} | chain price: {} | size: {}",
            exchange_price, screen.price, size
        );

        let Some(direction) = decide(exchange_price, screen.price, pair.risk_factor) else {
            info!("No arb opportunity (risk factor {})", pair.risk_factor);
            return Ok(RunOutcome::NoOpportunity);
        };
        self.stats.opportunities.fetch_add(1, Ordering::Relaxed);
        info!("🎯 Arbitrage opportunity: {}", direction);

        // the screening quote was taken base -> quote; always requote for the decided side
        let side = direction.chain_side();
        let quote = self
            .quote(pair, side, swap_input_amount(direction, size, screen.price))
            .await?;
        if decide(exchange_price, quote.price, pair.risk_factor) != Some(direction) {
            info!(
                "Opportunity gone after requote (chain price {} -> {})",
                screen.price, quote.price
            );
            return Ok(RunOutcome::NoOpportunity);
        }

        let (token_in, _) = pair.swap_denoms(side);
        let order = SwapOrder {
            token_in_denom: token_in.to_string(),
            amount_in: quote.route.amount_in,
            min_out: min_out_floor(quote.route.amount_out, self.max_slippage_bps),
            route: quote.route.clone(),
        };
        debug!(
            "Swap order: {}{} -> min {}{}",
            order.amount_in, order.token_in_denom, order.min_out, quote.route.token_out_denom
        );

        let receipt = self.submitter.submit(&order).await?;
        if !receipt.broadcast {
            return Ok(RunOutcome::DryRun {
                direction,
                size,
                swap_hash: receipt.swap_hash,
            });
        }

        let (height, gas_used) = match self
            .tracker
            .wait(&receipt.swap_hash)
            .await?
            .into_result(&receipt.swap_hash)?
        {
            TxStatus::Committed { height, gas_used } => (height, gas_used),
            _ => {
                warn!(
                    "⚠️ Swap {} not confirmed; skipping exchange leg",
                    receipt.swap_hash
                );
                return Ok(RunOutcome::Unconfirmed {
                    direction,
                    swap_hash: receipt.swap_hash,
                });
            }
        };

        let exchange_side = direction.exchange_side();
        let fill = match with_timeout(
            "exchange order",
            self.call_timeout,
            self.exchange
                .market_order(&pair.exchange_ticker, exchange_side, size),
        )
        .await
        {
            Ok(fill) => fill,
            Err(e) => {
                error!(
                    "❌ Chain swap {} committed but exchange {} {} failed: {}",
                    receipt.swap_hash,
                    exchange_side.as_str(),
                    size,
                    e
                );
                if let Some(journal) = &self.journal {
                    let entry = UnhedgedEntry {
                        timestamp: chrono::Utc::now(),
                        pair: pair.exchange_ticker.clone(),
                        direction,
                        exchange_side,
                        size,
                        exchange_price,
                        chain_price: quote.price,
                        bid_hash: receipt.bid_hash.clone(),
                        swap_hash: receipt.swap_hash.clone(),
                        height,
                        error: e.to_string(),
                        balances_before: balances,
                    };
                    if let Err(je) = journal.record_unhedged(&entry) {
                        warn!("Failed to journal unhedged swap {}: {}", receipt.swap_hash, je);
                    }
                }
                return Err(e);
            }
        };
        info!(
            "Exchange {} filled {} @ {}",
            exchange_side.as_str(),
            fill.executed_quantity,
            fill.executed_price
        );

        self.stats.executed.fetch_add(1, Ordering::Relaxed);
        let report = TradeReport {
            pair: pair.exchange_ticker.clone(),
            direction,
            size,
            exchange_price,
            chain_price: quote.price,
            bid_hash: receipt.bid_hash,
            swap_hash: receipt.swap_hash,
            height,
            gas_used,
            fill,
        };

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record(&report, &balances) {
                warn!("Failed to journal trade {}: {}", report.swap_hash, e);
            }
        }

        match self.reader.balances(pair).await {
            Ok(after) => info!("Balance after arb: {}", after),
            Err(e) => warn!("Could not re-read balances after arb: {}", e),
        }

        Ok(RunOutcome::Executed(report))
    }

    async fn quote(
        &self,
        pair: &PairConfig,
        side: ChainSide,
        amount: Decimal,
    ) -> ArbResult<PriceQuote> {
        with_timeout(
            "route quote",
            self.call_timeout,
            self.resolver.resolve(pair, side, amount),
        )
        .await
    }
}
