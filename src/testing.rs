//! In-memory collaborators for unit tests

use crate::chain::client::{AccountState, ChainClient, TxResult};
use crate::chain::router::RouteProvider;
use crate::config::{from_lookup, BotConfig};
use crate::error::{ArbError, ArbResult};
use crate::exchange::ExchangeClient;
use crate::types::{OrderFill, OrderSide, PairConfig, PoolHop, QuotedRoute, SplitRoute};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const KEY_HEX: &str = "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35";

/// Minimal config with millisecond confirmation timing
pub fn test_config(live: bool) -> BotConfig {
    let vars = HashMap::from([
        ("LCD_URL", "http://localhost:1317"),
        ("CHAIN_SIGNING_KEY", KEY_HEX),
        ("EXCHANGE_API_KEY", "key"),
        ("EXCHANGE_API_SECRET", "secret"),
        ("CONFIRMATION_DELAY_MS", "1"),
        ("CONFIRMATION_MAX_POLLS", "2"),
        ("LIVE_MODE", if live { "true" } else { "false" }),
    ]);
    from_lookup(|k| vars.get(k).map(|v| v.to_string()), vec![]).unwrap()
}

/// BTC (8 decimals) against USDT (6 decimals)
pub fn btc_pair(risk_factor: Decimal) -> PairConfig {
    PairConfig {
        base_denom: "ubtc".to_string(),
        quote_denom: "uusdt".to_string(),
        base_exponent: 8,
        quote_exponent: 6,
        exchange_ticker: "BTCUSDT".to_string(),
        base_symbol: "BTC".to_string(),
        quote_symbol: "USDT".to_string(),
        risk_factor,
        quantity_precision: 5,
    }
}

pub struct MockChain {
    /// Sequences returned by successive account queries; the last one repeats
    pub sequences: Mutex<VecDeque<u64>>,
    pub account_number: u64,
    pub balances: Mutex<HashMap<String, u128>>,
    pub height: u64,
    /// Scripted broadcast answers; once empty every broadcast is accepted
    pub broadcast_answers: Mutex<VecDeque<ArbResult<()>>>,
    pub broadcasts: Mutex<Vec<Vec<u8>>>,
    /// Returned for every tx lookup
    pub tx_result: Mutex<Option<TxResult>>,
    pub lookups: Mutex<Vec<String>>,
}

impl MockChain {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequences: Mutex::new(VecDeque::from([sequence])),
            account_number: 7,
            balances: Mutex::new(HashMap::new()),
            height: 1_000,
            broadcast_answers: Mutex::new(VecDeque::new()),
            broadcasts: Mutex::new(Vec::new()),
            tx_result: Mutex::new(None),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, denom: &str, amount: u128) {
        self.balances.lock().unwrap().insert(denom.to_string(), amount);
    }

    pub fn commit_all(&self, code: u32, raw_log: &str) {
        *self.tx_result.lock().unwrap() = Some(TxResult {
            height: self.height + 1,
            code,
            raw_log: raw_log.to_string(),
            gas_used: 812_345,
        });
    }

    pub fn reject_next(&self, code: u32, raw_log: &str) {
        self.broadcast_answers
            .lock()
            .unwrap()
            .push_back(Err(ArbError::BroadcastRejected {
                code,
                raw_log: raw_log.to_string(),
            }));
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn account(&self, _address: &str) -> ArbResult<AccountState> {
        let mut sequences = self.sequences.lock().unwrap();
        let sequence = if sequences.len() > 1 {
            sequences.pop_front().unwrap_or_default()
        } else {
            sequences.front().copied().unwrap_or_default()
        };
        Ok(AccountState {
            account_number: self.account_number,
            sequence,
        })
    }

    async fn balance(&self, _address: &str, denom: &str) -> ArbResult<u128> {
        Ok(self.balances.lock().unwrap().get(denom).copied().unwrap_or(0))
    }

    async fn latest_height(&self) -> ArbResult<u64> {
        Ok(self.height)
    }

    async fn broadcast(&self, tx_bytes: &[u8]) -> ArbResult<String> {
        self.broadcasts.lock().unwrap().push(tx_bytes.to_vec());
        if let Some(answer) = self.broadcast_answers.lock().unwrap().pop_front() {
            answer?;
        }
        Ok(hex::encode_upper(Sha256::digest(tx_bytes)))
    }

    async fn get_tx(&self, hash: &str) -> ArbResult<Option<TxResult>> {
        self.lookups.lock().unwrap().push(hash.to_string());
        Ok(self.tx_result.lock().unwrap().clone())
    }
}

pub struct MockExchange {
    pub price: Decimal,
    /// symbol -> free balance
    pub balances: HashMap<String, Decimal>,
    pub orders: Mutex<Vec<(String, OrderSide, Decimal)>>,
    /// Artificial latency of the price call
    pub delay: Mutex<Duration>,
    /// Reject every market order with a 400
    pub fail_orders: AtomicBool,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockExchange {
    pub fn new(price: Decimal, base: Decimal, quote: Decimal) -> Self {
        Self {
            price,
            balances: HashMap::from([("BTC".to_string(), base), ("USDT".to_string(), quote)]),
            orders: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            fail_orders: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn spot_price(&self, _ticker: &str) -> ArbResult<Decimal> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.price)
    }

    async fn free_balances(&self, symbols: &[&str]) -> ArbResult<Vec<Decimal>> {
        Ok(symbols
            .iter()
            .map(|s| self.balances.get(*s).copied().unwrap_or(Decimal::ZERO))
            .collect())
    }

    async fn market_order(
        &self,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ArbResult<OrderFill> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(ArbError::HttpStatus {
                context: "exchange order",
                status: 400,
                body: "{\"code\":-2010,\"msg\":\"Account has insufficient balance\"}".to_string(),
            });
        }
        self.orders
            .lock()
            .unwrap()
            .push((ticker.to_string(), side, quantity));
        Ok(OrderFill {
            executed_quantity: quantity,
            executed_price: self.price,
        })
    }
}

/// Routes everything through one pool at a fixed quote-per-base price,
/// assuming the 8/6 exponents of `btc_pair`.
pub struct MockRouter {
    pub price: Decimal,
    pub base_denom: String,
    pub requests: Mutex<Vec<(String, String, u128)>>,
}

impl MockRouter {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            base_denom: "ubtc".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RouteProvider for MockRouter {
    async fn get_route(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
        amount_in: u128,
    ) -> ArbResult<QuotedRoute> {
        self.requests.lock().unwrap().push((
            token_in_denom.to_string(),
            token_out_denom.to_string(),
            amount_in,
        ));
        let raw_in = Decimal::from(amount_in as u64);
        // raw base = human * 1e8, raw quote = human * 1e6
        let out = if token_in_denom == self.base_denom {
            raw_in * self.price / dec!(100)
        } else {
            raw_in * dec!(100) / self.price
        };
        Ok(QuotedRoute {
            token_in_denom: token_in_denom.to_string(),
            token_out_denom: token_out_denom.to_string(),
            amount_in,
            amount_out: out.trunc().to_u128().unwrap_or(0),
            splits: vec![SplitRoute {
                hops: vec![PoolHop {
                    pool_id: 1400,
                    token_out_denom: token_out_denom.to_string(),
                }],
                amount_in,
            }],
        })
    }
}
