//! Binance Spot REST client
//!
//! Public ticker price plus the two signed endpoints the bot needs
//! (account balances, market orders). Signed requests carry an
//! HMAC-SHA256 of the query string and the `X-MBX-APIKEY` header.

use super::ExchangeClient;
use crate::error::{ArbError, ArbResult};
use crate::types::{OrderFill, OrderSide};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW_MS: u64 = 5000;

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AssetBalance>,
}

#[derive(Debug, Deserialize)]
struct AssetBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(rename = "executedQty")]
    executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty", default)]
    cumulative_quote_qty: Option<String>,
    #[serde(default)]
    fills: Vec<FillResponse>,
}

#[derive(Debug, Deserialize)]
struct FillResponse {
    price: String,
    qty: String,
}

pub struct BinanceClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BinanceClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        timeout: Duration,
    ) -> ArbResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbError::network("exchange client setup", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    /// Append timestamp, recvWindow and signature to a query string
    fn signed_query(&self, params: &[(&str, String)]) -> ArbResult<String> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={}",
            RECV_WINDOW_MS,
            chrono::Utc::now().timestamp_millis()
        ));
        let signature = hmac_hex(&self.api_secret, &query)?;
        Ok(format!("{}&signature={}", query, signature))
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn spot_price(&self, ticker: &str) -> ArbResult<Decimal> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("symbol", ticker)])
            .send()
            .await
            .map_err(|e| ArbError::network("exchange spot price", e))?;
        let ticker_price: TickerPrice = read_json("exchange spot price", resp).await?;
        parse_decimal("exchange spot price", &ticker_price.price)
    }

    async fn free_balances(&self, symbols: &[&str]) -> ArbResult<Vec<Decimal>> {
        let query = self.signed_query(&[])?;
        let url = format!("{}/api/v3/account?{}", self.base_url, query);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| ArbError::network("exchange balances", e))?;
        let account: AccountInfo = read_json("exchange balances", resp).await?;
        pick_balances(&account.balances, symbols)
    }

    async fn market_order(
        &self,
        ticker: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> ArbResult<OrderFill> {
        let query = self.signed_query(&[
            ("symbol", ticker.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.normalize().to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ])?;
        debug!("Exchange order {} {} {}", side.as_str(), quantity, ticker);

        let url = format!("{}/api/v3/order?{}", self.base_url, query);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| ArbError::network("exchange order", e))?;
        let order: OrderResponse = read_json("exchange order", resp).await?;
        fill_from_order(&order)
    }
}

async fn read_json<T: DeserializeOwned>(context: &'static str, resp: Response) -> ArbResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ArbError::HttpStatus {
            context,
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| ArbError::decode(context, e))
}

fn parse_decimal(context: &'static str, raw: &str) -> ArbResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| ArbError::decode(context, format!("'{}': {}", raw, e)))
}

fn hmac_hex(secret: &str, message: &str) -> ArbResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ArbError::Config(format!("exchange secret: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Free balances in the order of `symbols`; symbols absent from the account read as zero.
fn pick_balances(balances: &[AssetBalance], symbols: &[&str]) -> ArbResult<Vec<Decimal>> {
    symbols
        .iter()
        .map(|symbol| match balances.iter().find(|b| b.asset == *symbol) {
            Some(balance) => parse_decimal("exchange balances", &balance.free),
            None => Ok(Decimal::ZERO),
        })
        .collect()
}

/// Executed quantity and quantity-weighted average fill price
fn fill_from_order(order: &OrderResponse) -> ArbResult<OrderFill> {
    let executed_quantity = parse_decimal("exchange order", &order.executed_qty)?;

    let mut filled_qty = Decimal::ZERO;
    let mut filled_notional = Decimal::ZERO;
    for fill in &order.fills {
        let price = parse_decimal("exchange order", &fill.price)?;
        let qty = parse_decimal("exchange order", &fill.qty)?;
        filled_qty += qty;
        filled_notional += price * qty;
    }

    let executed_price = if !filled_qty.is_zero() {
        filled_notional / filled_qty
    } else if let (Some(quote), false) = (&order.cumulative_quote_qty, executed_quantity.is_zero()) {
        parse_decimal("exchange order", quote)? / executed_quantity
    } else {
        Decimal::ZERO
    };

    Ok(OrderFill {
        executed_quantity,
        executed_price,
    })
}
