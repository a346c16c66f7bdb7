//! Arbitrage Decision Engine
//!
//! Sizing: 10% of the smaller of the base balance and the base-equivalent of
//! the quote balance at the exchange price.
//!
//! Direction: one three-way comparison with the same risk factor on both
//! branches, so at most one branch can fire.

use crate::error::{ArbError, ArbResult};
use crate::types::{BalanceSnapshot, Direction};
use rust_decimal::{Decimal, RoundingStrategy};

/// Share of the smaller balance committed per trade (10%)
pub fn trade_fraction() -> Decimal {
    Decimal::new(1, 1)
}

/// Trade size in base units
pub fn size_trade(balances: &BalanceSnapshot, exchange_price: Decimal) -> ArbResult<Decimal> {
    let base = balances.base();
    let quote = balances.quote();
    if base <= Decimal::ZERO || quote <= Decimal::ZERO {
        return Err(ArbError::InsufficientBalance { base, quote });
    }
    if exchange_price <= Decimal::ZERO {
        return Err(ArbError::InvalidPrice {
            context: "exchange",
            price: exchange_price,
        });
    }
    let base_equivalent = quote / exchange_price;
    Ok(trade_fraction() * base.min(base_equivalent))
}

/// `None` when the spread sits inside the risk margin
pub fn decide(
    exchange_price: Decimal,
    chain_price: Decimal,
    risk_factor: Decimal,
) -> Option<Direction> {
    if exchange_price < chain_price * risk_factor {
        Some(Direction::BuyExchangeSellChain)
    } else if exchange_price * risk_factor > chain_price {
        Some(Direction::SellExchangeBuyChain)
    } else {
        None
    }
}

/// Round a quantity down to the exchange's accepted precision
pub fn round_quantity(size: Decimal, precision: u32) -> Decimal {
    size.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}

/// Human amount of the swap's input token: base when selling base on chain,
/// quote worth `size` base at the chain price when buying it.
pub fn swap_input_amount(direction: Direction, size: Decimal, chain_price: Decimal) -> Decimal {
    match direction {
        Direction::BuyExchangeSellChain => size,
        Direction::SellExchangeBuyChain => size * chain_price,
    }
}
