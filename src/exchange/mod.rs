//! Exchange Module
//!
//! Spot price, balances and market orders on the centralized exchange.
//! The pipeline only talks to the `ExchangeClient` trait; `BinanceClient`
//! is the REST implementation.

pub mod binance;

pub use binance::BinanceClient;

use crate::error::ArbResult;
use crate::types::{OrderFill, OrderSide};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Last traded price for `ticker` (quote per base)
    async fn spot_price(&self, ticker: &str) -> ArbResult<Decimal>;

    /// Free balance for each symbol, in the order requested. Unknown symbols read as zero.
    async fn free_balances(&self, symbols: &[&str]) -> ArbResult<Vec<Decimal>>;

    /// Market order for `quantity` units of base
    async fn market_order(
        &self,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ArbResult<OrderFill>;
}
