//! Chain query and transaction client
//!
//! `ChainClient` is the boundary the signer, submitter and tracker talk to.
//! `LcdClient` implements it over the Cosmos SDK REST (LCD) gateway.

use crate::error::{ArbError, ArbResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Point-in-time account state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub account_number: u64,
    pub sequence: u64,
}

/// Result of a transaction that made it into a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub height: u64,
    pub code: u32,
    pub raw_log: String,
    pub gas_used: u64,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn account(&self, address: &str) -> ArbResult<AccountState>;

    /// Raw integer balance of `denom`
    async fn balance(&self, address: &str, denom: &str) -> ArbResult<u128>;

    async fn latest_height(&self) -> ArbResult<u64>;

    /// Mempool-level submission. Returns the tx hash once CheckTx accepted it,
    /// `BroadcastRejected` otherwise.
    async fn broadcast(&self, tx_bytes: &[u8]) -> ArbResult<String>;

    /// `None` while the tx is not (yet) indexed
    async fn get_tx(&self, hash: &str) -> ArbResult<Option<TxResult>>;
}

pub struct LcdClient {
    http: Client,
    base_url: String,
}

impl LcdClient {
    pub fn new(base_url: &str, timeout: Duration) -> ArbResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbError::network("lcd client setup", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(
        &self,
        context: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> ArbResult<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ArbError::network(context, e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| ArbError::network(context, e))?;
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, value))
    }
}

#[async_trait]
impl ChainClient for LcdClient {
    async fn account(&self, address: &str) -> ArbResult<AccountState> {
        let path = format!("/cosmos/auth/v1beta1/accounts/{}", address);
        let (status, body) = self.get_json("account query", &path, &[]).await?;
        if status == StatusCode::NOT_FOUND || is_not_found(&body) {
            return Err(ArbError::AccountNotFound {
                address: address.to_string(),
            });
        }
        ensure_success("account query", status, &body)?;
        parse_account(&body)
    }

    async fn balance(&self, address: &str, denom: &str) -> ArbResult<u128> {
        let path = format!("/cosmos/bank/v1beta1/balances/{}/by_denom", address);
        let (status, body) = self
            .get_json("balance query", &path, &[("denom", denom)])
            .await?;
        ensure_success("balance query", status, &body)?;
        parse_balance(&body)
    }

    async fn latest_height(&self) -> ArbResult<u64> {
        let (status, body) = self
            .get_json("latest block", "/cosmos/base/tendermint/v1beta1/blocks/latest", &[])
            .await?;
        ensure_success("latest block", status, &body)?;
        parse_height(&body)
    }

    async fn broadcast(&self, tx_bytes: &[u8]) -> ArbResult<String> {
        let url = format!("{}/cosmos/tx/v1beta1/txs", self.base_url);
        let payload = json!({
            "tx_bytes": BASE64.encode(tx_bytes),
            "mode": "BROADCAST_MODE_SYNC",
        });
        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ArbError::network("broadcast", e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| ArbError::network("broadcast", e))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        ensure_success("broadcast", status, &body)?;
        parse_broadcast(&body)
    }

    async fn get_tx(&self, hash: &str) -> ArbResult<Option<TxResult>> {
        let path = format!("/cosmos/tx/v1beta1/txs/{}", hash);
        let (status, body) = self.get_json("tx lookup", &path, &[]).await?;
        if status == StatusCode::NOT_FOUND || (!status.is_success() && is_not_found(&body)) {
            debug!("Tx {} not indexed yet", hash);
            return Ok(None);
        }
        ensure_success("tx lookup", status, &body)?;
        parse_tx_result(&body).map(Some)
    }
}

fn ensure_success(context: &'static str, status: StatusCode, body: &Value) -> ArbResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(ArbError::HttpStatus {
        context,
        status: status.as_u16(),
        body: body.to_string(),
    })
}

fn is_not_found(body: &Value) -> bool {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| body.as_str())
        .unwrap_or_default();
    message.contains("not found")
}

/// LCD encodes 64-bit integers as strings; accept both forms.
fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn parse_account(body: &Value) -> ArbResult<AccountState> {
    let account = body
        .get("account")
        .ok_or_else(|| ArbError::decode("account query", "missing account"))?;

    // BaseAccount fields sit at the top level; vesting and module accounts nest them.
    let base = [
        Some(account),
        account.get("base_account"),
        account
            .get("base_vesting_account")
            .and_then(|v| v.get("base_account")),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| candidate.get("account_number").is_some())
    .ok_or_else(|| ArbError::decode("account query", "no account_number"))?;

    let account_number = as_u64(base.get("account_number"))
        .ok_or_else(|| ArbError::decode("account query", "bad account_number"))?;
    // a fresh account may omit sequence entirely
    let sequence = match base.get("sequence") {
        None => 0,
        some => as_u64(some).ok_or_else(|| ArbError::decode("account query", "bad sequence"))?,
    };
    Ok(AccountState {
        account_number,
        sequence,
    })
}

fn parse_balance(body: &Value) -> ArbResult<u128> {
    let amount = body
        .get("balance")
        .and_then(|b| b.get("amount"))
        .and_then(Value::as_str)
        .unwrap_or("0");
    amount
        .parse::<u128>()
        .map_err(|e| ArbError::decode("balance query", format!("'{}': {}", amount, e)))
}

fn parse_height(body: &Value) -> ArbResult<u64> {
    ["block", "sdk_block"]
        .iter()
        .find_map(|key| as_u64(body.get(*key).and_then(|b| b.pointer("/header/height"))))
        .ok_or_else(|| ArbError::decode("latest block", "missing header height"))
}

fn parse_broadcast(body: &Value) -> ArbResult<String> {
    let resp = body
        .get("tx_response")
        .ok_or_else(|| ArbError::decode("broadcast", "missing tx_response"))?;
    let code = as_u64(resp.get("code")).unwrap_or(0) as u32;
    if code != 0 {
        return Err(ArbError::BroadcastRejected {
            code,
            raw_log: resp
                .get("raw_log")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    resp.get("txhash")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ArbError::decode("broadcast", "missing txhash"))
}

fn parse_tx_result(body: &Value) -> ArbResult<TxResult> {
    let resp = body
        .get("tx_response")
        .ok_or_else(|| ArbError::decode("tx lookup", "missing tx_response"))?;
    Ok(TxResult {
        height: as_u64(resp.get("height")).unwrap_or(0),
        code: as_u64(resp.get("code")).unwrap_or(0) as u32,
        raw_log: resp
            .get("raw_log")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        gas_used: as_u64(resp.get("gas_used")).unwrap_or(0),
    })
}
