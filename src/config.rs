//! Configuration management
//!
//! Process-wide settings come from an env file (dotenv), the per-pair list
//! from a TOML file with one `[[pair]]` table per asset pair. Secrets are
//! only ever read from the environment.

use crate::types::PairConfig;
use crate::units::MAX_EXPONENT;
use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHAIN_ID: &str = "osmosis-1";
pub const DEFAULT_EXCHANGE_URL: &str = "https://api.binance.com";
pub const DEFAULT_SQS_URL: &str = "https://sqs.osmosis.zone";

/// Process-wide bot configuration
#[derive(Clone)]
pub struct BotConfig {
    // Chain
    pub chain_id: String,
    pub lcd_url: String,
    pub bech32_prefix: String,

    // Signing (secrets)
    pub signing_key_hex: String,
    pub cosigner_keys_hex: Vec<String>,
    pub selected_authenticators: Vec<u64>,

    // Tx envelope
    pub fee_denom: String,
    pub fee_amount: u128,
    pub gas_limit: u64,
    pub timeout_height_horizon: u64,

    // Top-of-block auction
    pub bid_denom: String,
    pub bid_amount: u128,

    // Router
    pub sqs_url: String,
    pub sqs_api_key: Option<String>,

    // Exchange (secrets)
    pub exchange_url: String,
    pub exchange_api_key: String,
    pub exchange_api_secret: String,

    // Timing
    pub check_interval_ms: u64,
    pub call_timeout_ms: u64,
    pub confirmation_delay_ms: u64,
    pub confirmation_max_polls: u32,

    // Execution
    pub max_slippage_bps: u32,
    pub live_mode: bool,
    pub journal_dir: Option<String>,

    pub pairs: Vec<PairConfig>,
}

impl BotConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("chain_id", &self.chain_id)
            .field("lcd_url", &self.lcd_url)
            .field("sqs_url", &self.sqs_url)
            .field("exchange_url", &self.exchange_url)
            .field("cosigners", &self.cosigner_keys_hex.len())
            .field("selected_authenticators", &self.selected_authenticators)
            .field("fee", &format!("{}{}", self.fee_amount, self.fee_denom))
            .field("gas_limit", &self.gas_limit)
            .field("bid", &format!("{}{}", self.bid_amount, self.bid_denom))
            .field("live_mode", &self.live_mode)
            .field("pairs", &self.pairs.len())
            .finish_non_exhaustive()
    }
}

/// Load settings from `env_file` (if present) plus the process environment,
/// and the pair list from `pairs_file`.
pub fn load_config_from_file(env_file: &str, pairs_file: &str) -> Result<BotConfig> {
    if let Err(e) = dotenv::from_filename(env_file) {
        tracing::warn!("Could not load {} ({}), using process environment only", env_file, e);
    }
    let pairs = load_pairs(pairs_file)?;
    from_lookup(|key| std::env::var(key).ok(), pairs)
}

/// Build a config from any key lookup (the environment in production).
pub fn from_lookup<F>(lookup: F, pairs: Vec<PairConfig>) -> Result<BotConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} not set", key))
    };
    let or_default = |key: &str, default: &str| -> String {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    Ok(BotConfig {
        chain_id: or_default("CHAIN_ID", DEFAULT_CHAIN_ID),
        lcd_url: required("LCD_URL")?,
        bech32_prefix: or_default("BECH32_PREFIX", "osmo"),

        signing_key_hex: required("CHAIN_SIGNING_KEY")?,
        cosigner_keys_hex: split_list(lookup("CHAIN_COSIGNER_KEYS")),
        selected_authenticators: split_list(lookup("SELECTED_AUTHENTICATORS"))
            .iter()
            .map(|s| s.parse::<u64>())
            .collect::<std::result::Result<Vec<u64>, _>>()
            .context("SELECTED_AUTHENTICATORS must be comma separated integers")?,

        fee_denom: or_default("FEE_DENOM", "uosmo"),
        fee_amount: parse_var("FEE_AMOUNT", &or_default("FEE_AMOUNT", "7000"))?,
        gas_limit: parse_var("GAS_LIMIT", &or_default("GAS_LIMIT", "1700000"))?,
        timeout_height_horizon: parse_var(
            "TIMEOUT_HEIGHT_HORIZON",
            &or_default("TIMEOUT_HEIGHT_HORIZON", "1"),
        )?,

        bid_denom: or_default("BID_DENOM", "uosmo"),
        bid_amount: parse_var("BID_AMOUNT", &or_default("BID_AMOUNT", "100"))?,

        sqs_url: or_default("SQS_URL", DEFAULT_SQS_URL),
        sqs_api_key: lookup("SQS_API_KEY").filter(|v| !v.trim().is_empty()),

        exchange_url: or_default("EXCHANGE_URL", DEFAULT_EXCHANGE_URL),
        exchange_api_key: required("EXCHANGE_API_KEY")?,
        exchange_api_secret: required("EXCHANGE_API_SECRET")?,

        check_interval_ms: parse_nonzero("CHECK_INTERVAL_MS", &or_default("CHECK_INTERVAL_MS", "1000"))?,
        call_timeout_ms: parse_nonzero("CALL_TIMEOUT_MS", &or_default("CALL_TIMEOUT_MS", "10000"))?,
        confirmation_delay_ms: parse_var(
            "CONFIRMATION_DELAY_MS",
            &or_default("CONFIRMATION_DELAY_MS", "6000"),
        )?,
        confirmation_max_polls: parse_nonzero(
            "CONFIRMATION_MAX_POLLS",
            &or_default("CONFIRMATION_MAX_POLLS", "3"),
        )?,

        max_slippage_bps: parse_max_slippage(&or_default("MAX_SLIPPAGE_BPS", "100"))?,
        live_mode: parse_var("LIVE_MODE", &or_default("LIVE_MODE", "false"))?,
        journal_dir: lookup("JOURNAL_DIR").filter(|v| !v.trim().is_empty()),

        pairs,
    })
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid {} value '{}': {}", key, raw, e))
}

fn parse_nonzero<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: fmt::Display,
{
    let value: T = parse_var(key, raw)?;
    if value == T::default() {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

fn parse_max_slippage(raw: &str) -> Result<u32> {
    let bps: u32 = parse_var("MAX_SLIPPAGE_BPS", raw)?;
    if bps >= 10_000 {
        bail!("MAX_SLIPPAGE_BPS must be below 10000, got {}", bps);
    }
    Ok(bps)
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Pair list file: one `[[pair]]` table per asset pair
#[derive(Debug, Clone, Deserialize)]
pub struct PairsFile {
    #[serde(rename = "pair")]
    pub pairs: Vec<PairConfig>,
}

/// Load and validate the pair list
pub fn load_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<PairConfig>> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read pairs file: {}", path.as_ref().display()))?;
    parse_pairs(&content)
}

pub fn parse_pairs(content: &str) -> Result<Vec<PairConfig>> {
    let file: PairsFile = toml::from_str(content).context("Failed to parse pairs TOML")?;
    if file.pairs.is_empty() {
        bail!("pairs file contains no [[pair]] entries");
    }
    for pair in &file.pairs {
        validate_pair(pair)?;
    }
    Ok(file.pairs)
}

fn validate_pair(pair: &PairConfig) -> Result<()> {
    if pair.risk_factor <= Decimal::ZERO || pair.risk_factor >= Decimal::ONE {
        bail!(
            "{}: risk_factor must be in (0, 1), got {}",
            pair.exchange_ticker,
            pair.risk_factor
        );
    }
    if pair.base_exponent > MAX_EXPONENT || pair.quote_exponent > MAX_EXPONENT {
        bail!(
            "{}: exponents must be <= {}",
            pair.exchange_ticker,
            MAX_EXPONENT
        );
    }
    if pair.base_denom == pair.quote_denom {
        bail!("{}: base and quote denom are identical", pair.exchange_ticker);
    }
    Ok(())
}
