//! Denomination exponent conversion
//!
//! Human-readable amounts are `Decimal`; on-chain amounts are raw integers.
//! Both directions truncate toward zero so buy-side and sell-side conversions
//! drift the same way across repeated cycles.

use crate::error::{ArbError, ArbResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Largest exponent accepted for a denomination (Decimal keeps 28 digits of scale).
/// Raw amounts past 2^96 lose fractional digits in `from_raw`.
pub const MAX_EXPONENT: u32 = 18;

/// 10^exp as a Decimal.
pub fn pow10(exp: u32) -> ArbResult<Decimal> {
    if exp > MAX_EXPONENT {
        return Err(ArbError::InvalidAmount {
            amount: "1".to_string(),
            exponent: exp,
        });
    }
    let mut value = Decimal::ONE;
    for _ in 0..exp {
        value *= Decimal::new(10, 0);
    }
    Ok(value)
}

/// `raw = trunc(amount * 10^exponent)`
pub fn to_raw(amount: Decimal, exponent: u32) -> ArbResult<u128> {
    let invalid = || ArbError::InvalidAmount {
        amount: amount.to_string(),
        exponent,
    };
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(invalid());
    }
    amount
        .checked_mul(pow10(exponent)?)
        .map(|scaled| scaled.trunc())
        .and_then(|scaled| scaled.to_u128())
        .ok_or_else(invalid)
}

/// `human = raw / 10^exponent`. Exact while `raw` fits Decimal's 96-bit
/// mantissa (about 7.9e28); larger amounts drop trailing fractional digits
/// until they fit. Fails only if the whole-unit part alone overflows.
pub fn from_raw(raw: u128, exponent: u32) -> ArbResult<Decimal> {
    let invalid = || ArbError::InvalidAmount {
        amount: raw.to_string(),
        exponent,
    };
    if exponent > MAX_EXPONENT {
        return Err(invalid());
    }
    let mut mantissa = raw;
    let mut scale = exponent;
    loop {
        if let Ok(signed) = i128::try_from(mantissa) {
            if let Ok(value) = Decimal::try_from_i128_with_scale(signed, scale) {
                return Ok(value);
            }
        }
        if scale == 0 {
            return Err(invalid());
        }
        mantissa /= 10;
        scale -= 1;
    }
}
