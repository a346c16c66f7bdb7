//! Error taxonomy for a single arbitrage run
//!
//! Every failure a pipeline run can hit maps onto one of these variants.
//! Transient variants (network, status, decode, timeout) end the run and
//! wait for the next timer tick; nothing is retried inside a run except the
//! single sequence-mismatch resubmission in the bundle submitter.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Cosmos SDK `ErrWrongSequence` ABCI code
pub const CODE_WRONG_SEQUENCE: u32 = 32;

#[derive(Debug, Error)]
pub enum ArbError {
    #[error("network error during {context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context} returned HTTP {status}: {body}")]
    HttpStatus {
        context: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed {context} payload: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },

    #[error("{context} timed out after {after:?}")]
    Timeout {
        context: &'static str,
        after: Duration,
    },

    #[error("insufficient balance for arbitrage (base: {base}, quote: {quote})")]
    InsufficientBalance { base: Decimal, quote: Decimal },

    #[error("invalid {context} price: {price}")]
    InvalidPrice {
        context: &'static str,
        price: Decimal,
    },

    #[error("cannot convert amount {amount} with exponent {exponent}")]
    InvalidAmount { amount: String, exponent: u32 },

    #[error("stale route: quoted for {found}, requested {expected}")]
    StaleRoute { expected: String, found: String },

    #[error("account {address} not found on chain")]
    AccountNotFound { address: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast rejected (code {code}): {raw_log}")]
    BroadcastRejected { code: u32, raw_log: String },

    #[error("tx {hash} committed but reverted (code {code}): {raw_log}")]
    CommittedButReverted {
        hash: String,
        code: u32,
        raw_log: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ArbError {
    pub fn network(context: &'static str, source: reqwest::Error) -> Self {
        ArbError::Network { context, source }
    }

    pub fn decode(context: &'static str, message: impl ToString) -> Self {
        ArbError::Decode {
            context,
            message: message.to_string(),
        }
    }

    /// Failures that only need the next timer tick to clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArbError::Network { .. }
                | ArbError::HttpStatus { .. }
                | ArbError::Decode { .. }
                | ArbError::Timeout { .. }
        )
    }

    /// Mempool rejection caused by a stale account sequence.
    pub fn is_sequence_mismatch(&self) -> bool {
        match self {
            ArbError::BroadcastRejected { code, raw_log } => {
                *code == CODE_WRONG_SEQUENCE || raw_log.contains("account sequence mismatch")
            }
            _ => false,
        }
    }
}

pub type ArbResult<T> = std::result::Result<T, ArbError>;

/// Bound an external call; expiry becomes a transient `Timeout`.
pub async fn with_timeout<T, F>(context: &'static str, after: Duration, fut: F) -> ArbResult<T>
where
    F: std::future::Future<Output = ArbResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ArbError::Timeout { context, after }),
    }
}
