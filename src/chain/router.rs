//! Swap Route Resolver
//!
//! Turns a human-unit amount and a chain side into a concrete split route and
//! execution price. Routes come from the sidecar query service (SQS) and are
//! only valid for the exact raw amount they were quoted for.

use crate::error::{ArbError, ArbResult};
use crate::types::{ChainSide, PairConfig, PoolHop, PriceQuote, QuotedRoute, SplitRoute};
use crate::units::{from_raw, to_raw};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Best route for exactly `amount_in` raw units of `token_in_denom`
    async fn get_route(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
        amount_in: u128,
    ) -> ArbResult<QuotedRoute>;
}

#[derive(Debug, Deserialize)]
struct SqsQuote {
    amount_out: String,
    #[serde(default)]
    route: Vec<SqsRoute>,
}

#[derive(Debug, Deserialize)]
struct SqsRoute {
    pools: Vec<SqsPool>,
    in_amount: String,
}

#[derive(Debug, Deserialize)]
struct SqsPool {
    id: u64,
    token_out_denom: String,
}

pub struct SqsRouter {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SqsRouter {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> ArbResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbError::network("router client setup", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl RouteProvider for SqsRouter {
    async fn get_route(
        &self,
        token_in_denom: &str,
        token_out_denom: &str,
        amount_in: u128,
    ) -> ArbResult<QuotedRoute> {
        let url = format!("{}/router/quote", self.base_url);
        let token_in = format!("{}{}", amount_in, token_in_denom);
        let mut request = self.http.get(&url).query(&[
            ("tokenIn", token_in.as_str()),
            ("tokenOutDenom", token_out_denom),
            ("humanDenoms", "false"),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ArbError::network("route quote", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ArbError::HttpStatus {
                context: "route quote",
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let quote: SqsQuote = resp
            .json()
            .await
            .map_err(|e| ArbError::decode("route quote", e))?;
        quote_to_route(quote, token_in_denom, token_out_denom, amount_in)
    }
}

fn parse_raw(field: &str, raw: &str) -> ArbResult<u128> {
    raw.trim()
        .parse::<u128>()
        .map_err(|e| ArbError::decode("route quote", format!("{} '{}': {}", field, raw, e)))
}

fn quote_to_route(
    quote: SqsQuote,
    token_in_denom: &str,
    token_out_denom: &str,
    amount_in: u128,
) -> ArbResult<QuotedRoute> {
    let splits = quote
        .route
        .into_iter()
        .map(|split| {
            Ok(SplitRoute {
                amount_in: parse_raw("in_amount", &split.in_amount)?,
                hops: split
                    .pools
                    .into_iter()
                    .map(|pool| PoolHop {
                        pool_id: pool.id,
                        token_out_denom: pool.token_out_denom,
                    })
                    .collect(),
            })
        })
        .collect::<ArbResult<Vec<_>>>()?;

    Ok(QuotedRoute {
        token_in_denom: token_in_denom.to_string(),
        token_out_denom: token_out_denom.to_string(),
        amount_in,
        amount_out: parse_raw("amount_out", &quote.amount_out)?,
        splits,
    })
}

/// Quote-per-base execution price of a route, in human units.
/// Both sides are expressed as quote per base so they compare directly
/// against the exchange price.
pub fn execution_price(
    pair: &PairConfig,
    side: ChainSide,
    amount_in: u128,
    amount_out: u128,
) -> ArbResult<Decimal> {
    let (base_raw, quote_raw) = match side {
        ChainSide::SellBase => (amount_in, amount_out),
        ChainSide::BuyBase => (amount_out, amount_in),
    };
    let base = from_raw(base_raw, pair.base_exponent)?;
    let quote = from_raw(quote_raw, pair.quote_exponent)?;
    let price = quote.checked_div(base).unwrap_or(Decimal::ZERO);
    if price <= Decimal::ZERO {
        return Err(ArbError::InvalidPrice {
            context: "chain execution",
            price,
        });
    }
    Ok(price)
}

pub struct RouteResolver {
    provider: Arc<dyn RouteProvider>,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn RouteProvider>) -> Self {
        Self { provider }
    }

    /// Quote `amount` human units of the side's input token.
    pub async fn resolve(
        &self,
        pair: &PairConfig,
        side: ChainSide,
        amount: Decimal,
    ) -> ArbResult<PriceQuote> {
        let exponent = pair.token_in_exponent(side);
        let raw = to_raw(amount, exponent)?;
        if raw == 0 {
            return Err(ArbError::InvalidAmount {
                amount: amount.to_string(),
                exponent,
            });
        }

        let (token_in, token_out) = pair.swap_denoms(side);
        let route = self.provider.get_route(token_in, token_out, raw).await?;
        check_route(&route, token_in, raw)?;

        let price = execution_price(pair, side, route.amount_in, route.amount_out)?;
        debug!(
            "Route {:?} {}{} -> {}{} ({} splits) @ {}",
            side,
            raw,
            token_in,
            route.amount_out,
            token_out,
            route.splits.len(),
            price
        );
        Ok(PriceQuote { price, side, route })
    }
}

/// A route is usable only for the token and exact amount it was quoted for,
/// and its splits must consume all of it.
pub fn check_route(route: &QuotedRoute, token_in_denom: &str, amount_in: u128) -> ArbResult<()> {
    let stale = |found: String| ArbError::StaleRoute {
        expected: format!("{}{}", amount_in, token_in_denom),
        found,
    };
    if route.token_in_denom != token_in_denom || route.amount_in != amount_in {
        return Err(stale(format!("{}{}", route.amount_in, route.token_in_denom)));
    }
    if route.splits.is_empty() || route.split_total() != amount_in {
        return Err(stale(format!(
            "{}{} across {} splits",
            route.split_total(),
            route.token_in_denom,
            route.splits.len()
        )));
    }
    Ok(())
}
