//! Balance & Price Snapshot
//!
//! Read-only view of both venues for one run. Nothing here is cached: every
//! call goes to the exchange and the chain.

use crate::chain::ChainClient;
use crate::error::{with_timeout, ArbError, ArbResult};
use crate::exchange::ExchangeClient;
use crate::types::{BalanceSnapshot, PairConfig};
use crate::units::from_raw;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub struct SnapshotReader {
    exchange: Arc<dyn ExchangeClient>,
    chain: Arc<dyn ChainClient>,
    /// Chain address holding the pair's balances
    address: String,
    call_timeout: Duration,
}

impl SnapshotReader {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        chain: Arc<dyn ChainClient>,
        address: String,
        call_timeout: Duration,
    ) -> Self {
        Self {
            exchange,
            chain,
            address,
            call_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Base and quote holdings on both venues, in human units
    pub async fn balances(&self, pair: &PairConfig) -> ArbResult<BalanceSnapshot> {
        let symbols = [pair.base_symbol.as_str(), pair.quote_symbol.as_str()];
        let (exchange, chain_base, chain_quote) = tokio::try_join!(
            with_timeout(
                "exchange balances",
                self.call_timeout,
                self.exchange.free_balances(&symbols)
            ),
            with_timeout(
                "chain balance",
                self.call_timeout,
                self.chain.balance(&self.address, &pair.base_denom)
            ),
            with_timeout(
                "chain balance",
                self.call_timeout,
                self.chain.balance(&self.address, &pair.quote_denom)
            ),
        )?;

        let &[exchange_base, exchange_quote] = exchange.as_slice() else {
            return Err(ArbError::decode(
                "exchange balances",
                format!("expected 2 balances, got {}", exchange.len()),
            ));
        };

        Ok(BalanceSnapshot {
            exchange_base,
            exchange_quote,
            chain_base: from_raw(chain_base, pair.base_exponent)?,
            chain_quote: from_raw(chain_quote, pair.quote_exponent)?,
        })
    }

    /// Exchange spot price, quote per base
    pub async fn exchange_price(&self, pair: &PairConfig) -> ArbResult<Decimal> {
        let price = with_timeout(
            "exchange spot price",
            self.call_timeout,
            self.exchange.spot_price(&pair.exchange_ticker),
        )
        .await?;
        if price <= Decimal::ZERO {
            return Err(ArbError::InvalidPrice {
                context: "exchange",
                price,
            });
        }
        Ok(price)
    }
}
