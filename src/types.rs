// Core data structures shared by the decision engine and the chain leg

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static description of one exchange/chain asset pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// On-chain denom of the base asset (e.g. an IBC or tokenfactory denom)
    pub base_denom: String,
    /// On-chain denom of the quote asset
    pub quote_denom: String,
    pub base_exponent: u32,
    pub quote_exponent: u32,

    /// Exchange ticker (e.g. "BTCUSDT")
    pub exchange_ticker: String,
    /// Exchange asset symbols used for balance lookups
    pub base_symbol: String,
    pub quote_symbol: String,

    /// Safety margin in (0, 1); only spreads wider than this trigger a trade
    pub risk_factor: Decimal,
    /// Decimal places accepted by the exchange for order quantity
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
}

fn default_quantity_precision() -> u32 {
    5
}

impl PairConfig {
    /// Denoms (token_in, token_out) for a swap on the given chain side
    pub fn swap_denoms(&self, side: ChainSide) -> (&str, &str) {
        match side {
            ChainSide::SellBase => (&self.base_denom, &self.quote_denom),
            ChainSide::BuyBase => (&self.quote_denom, &self.base_denom),
        }
    }

    /// Exponent of the token going into a swap on the given side
    pub fn token_in_exponent(&self, side: ChainSide) -> u32 {
        match side {
            ChainSide::SellBase => self.base_exponent,
            ChainSide::BuyBase => self.quote_exponent,
        }
    }
}

/// Holdings summed across both venues, in human-readable units.
/// Captured fresh for every run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub exchange_base: Decimal,
    pub exchange_quote: Decimal,
    pub chain_base: Decimal,
    pub chain_quote: Decimal,
}

impl BalanceSnapshot {
    pub fn base(&self) -> Decimal {
        self.exchange_base + self.chain_base
    }

    pub fn quote(&self) -> Decimal {
        self.exchange_quote + self.chain_quote
    }
}

impl fmt::Display for BalanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "base {} (exchange {} + chain {}), quote {} (exchange {} + chain {})",
            self.base(),
            self.exchange_base,
            self.chain_base,
            self.quote(),
            self.exchange_quote,
            self.chain_quote
        )
    }
}

/// Which way the chain-side swap moves the base asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainSide {
    /// base -> quote
    SellBase,
    /// quote -> base
    BuyBase,
}

/// Exchange order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Trade direction picked by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Exchange is cheap: buy base there, sell base on chain
    BuyExchangeSellChain,
    /// Exchange is rich: sell base there, buy base on chain
    SellExchangeBuyChain,
}

impl Direction {
    pub fn exchange_side(&self) -> OrderSide {
        match self {
            Direction::BuyExchangeSellChain => OrderSide::Buy,
            Direction::SellExchangeBuyChain => OrderSide::Sell,
        }
    }

    pub fn chain_side(&self) -> ChainSide {
        match self {
            Direction::BuyExchangeSellChain => ChainSide::SellBase,
            Direction::SellExchangeBuyChain => ChainSide::BuyBase,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::BuyExchangeSellChain => write!(f, "buy exchange / sell chain"),
            Direction::SellExchangeBuyChain => write!(f, "sell exchange / buy chain"),
        }
    }
}

/// One pool hop of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHop {
    pub pool_id: u64,
    pub token_out_denom: String,
}

/// A split of the input amount sent through an ordered list of hops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRoute {
    pub hops: Vec<PoolHop>,
    pub amount_in: u128,
}

/// A route as quoted by the router. Only valid for `amount_in` of `token_in_denom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedRoute {
    pub token_in_denom: String,
    pub token_out_denom: String,
    pub amount_in: u128,
    pub amount_out: u128,
    pub splits: Vec<SplitRoute>,
}

impl QuotedRoute {
    /// Sum of the per-split input amounts
    pub fn split_total(&self) -> u128 {
        self.splits.iter().map(|s| s.amount_in).sum()
    }
}

/// Chain execution price (quote per base, human units) with the route it was quoted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub side: ChainSide,
    pub route: QuotedRoute,
}

/// Exchange market order result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub executed_quantity: Decimal,
    pub executed_price: Decimal,
}

/// Summary of an executed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReport {
    pub pair: String,
    pub direction: Direction,
    pub size: Decimal,
    pub exchange_price: Decimal,
    pub chain_price: Decimal,
    pub bid_hash: String,
    pub swap_hash: String,
    pub height: u64,
    pub gas_used: u64,
    pub fill: OrderFill,
}

/// How a pipeline run ended when it did not fail
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Spread inside the risk margin
    NoOpportunity,
    /// Decision made and transactions signed, nothing broadcast
    DryRun {
        direction: Direction,
        size: Decimal,
        swap_hash: String,
    },
    /// Bundle broadcast but the swap was not found before the polling bound
    Unconfirmed {
        direction: Direction,
        swap_hash: String,
    },
    Executed(TradeReport),
}
