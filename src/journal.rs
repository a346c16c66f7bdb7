//! Trade Journal
//!
//! Append-only JSONL records, one file per kind and UTC day:
//! `<dir>/trades_YYYY-MM-DD.jsonl` for executed runs and
//! `<dir>/unhedged_YYYY-MM-DD.jsonl` for runs whose chain swap committed but
//! whose exchange order failed.

use crate::types::{BalanceSnapshot, Direction, OrderSide, TradeReport};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub report: TradeReport,
    pub balances_before: BalanceSnapshot,
}

/// Chain leg committed, exchange leg missing: an open one-sided position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnhedgedEntry {
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub direction: Direction,
    /// Exchange order that was not filled
    pub exchange_side: OrderSide,
    pub size: Decimal,
    pub exchange_price: Decimal,
    pub chain_price: Decimal,
    pub bid_hash: String,
    pub swap_hash: String,
    pub height: u64,
    pub error: String,
    pub balances_before: BalanceSnapshot,
}

const TRADES: &str = "trades";
const UNHEDGED: &str = "unhedged";

pub struct TradeJournal {
    base_dir: PathBuf,
}

impl TradeJournal {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create journal directory: {:?}", base_dir))?;
        Ok(Self { base_dir })
    }

    pub fn file_path_for(&self, day: NaiveDate) -> PathBuf {
        self.path(TRADES, day)
    }

    pub fn unhedged_path_for(&self, day: NaiveDate) -> PathBuf {
        self.path(UNHEDGED, day)
    }

    fn path(&self, kind: &str, day: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.jsonl", kind, day.format("%Y-%m-%d")))
    }

    pub fn record(&self, report: &TradeReport, balances_before: &BalanceSnapshot) -> Result<PathBuf> {
        let entry = JournalEntry {
            timestamp: Utc::now(),
            report: report.clone(),
            balances_before: *balances_before,
        };
        self.append(&entry)
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<PathBuf> {
        self.append_line(TRADES, entry.timestamp, entry)
    }

    pub fn record_unhedged(&self, entry: &UnhedgedEntry) -> Result<PathBuf> {
        self.append_line(UNHEDGED, entry.timestamp, entry)
    }

    pub fn read_day(&self, day: NaiveDate) -> Result<Vec<JournalEntry>> {
        self.read_lines(TRADES, day)
    }

    pub fn read_unhedged_day(&self, day: NaiveDate) -> Result<Vec<UnhedgedEntry>> {
        self.read_lines(UNHEDGED, day)
    }

    fn append_line<T: Serialize>(
        &self,
        kind: &str,
        timestamp: DateTime<Utc>,
        entry: &T,
    ) -> Result<PathBuf> {
        let path = self.path(kind, timestamp.date_naive());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open journal file: {:?}", path))?;
        let json = serde_json::to_string(entry).context("Failed to serialize journal entry")?;
        writeln!(file, "{}", json)?;
        Ok(path)
    }

    fn read_lines<T: DeserializeOwned>(&self, kind: &str, day: NaiveDate) -> Result<Vec<T>> {
        let path = self.path(kind, day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: T = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse journal line: {}", line))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderFill;
    use rust_decimal_macros::dec;
    use std::env;

    fn report(swap_hash: &str) -> TradeReport {
        TradeReport {
            pair: "BTCUSDT".to_string(),
            direction: Direction::BuyExchangeSellChain,
            size: dec!(0.01666),
            exchange_price: dec!(58000),
            chain_price: dec!(61000),
            bid_hash: "B1D".to_string(),
            swap_hash: swap_hash.to_string(),
            height: 18_000_001,
            gas_used: 812_345,
            fill: OrderFill {
                executed_quantity: dec!(0.01666),
                executed_price: dec!(58010.5),
            },
        }
    }

    fn balances() -> BalanceSnapshot {
        BalanceSnapshot {
            exchange_base: dec!(0.2),
            exchange_quote: dec!(4000),
            chain_base: dec!(0.3),
            chain_quote: dec!(6000),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = env::temp_dir().join("cexarb_journal_test");
        let _ = fs::remove_dir_all(&dir);
        let journal = TradeJournal::new(&dir).unwrap();

        let path = journal.record(&report("AAA"), &balances()).unwrap();
        journal.record(&report("BBB"), &balances()).unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".jsonl"));

        let entries = journal.read_day(Utc::now().date_naive()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].report.swap_hash, "AAA");
        assert_eq!(entries[1].report.fill.executed_price, dec!(58010.5));
        assert_eq!(entries[1].balances_before.base(), dec!(0.5));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_day_is_empty() {
        let dir = env::temp_dir().join("cexarb_journal_empty_test");
        let _ = fs::remove_dir_all(&dir);
        let journal = TradeJournal::new(&dir).unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(journal.read_day(day).unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unhedged_entries_kept_apart_from_trades() {
        let dir = env::temp_dir().join("cexarb_journal_unhedged_test");
        let _ = fs::remove_dir_all(&dir);
        let journal = TradeJournal::new(&dir).unwrap();

        let entry = UnhedgedEntry {
            timestamp: Utc::now(),
            pair: "BTCUSDT".to_string(),
            direction: Direction::BuyExchangeSellChain,
            exchange_side: OrderSide::Buy,
            size: dec!(0.01724),
            exchange_price: dec!(58000),
            chain_price: dec!(61000),
            bid_hash: "B1D".to_string(),
            swap_hash: "5WAP".to_string(),
            height: 18_000_001,
            error: "exchange order timed out".to_string(),
            balances_before: balances(),
        };
        let path = journal.record_unhedged(&entry).unwrap();
        assert!(path.to_string_lossy().contains("unhedged_"));

        let today = Utc::now().date_naive();
        assert!(journal.read_day(today).unwrap().is_empty());
        let read = journal.read_unhedged_day(today).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].swap_hash, "5WAP");
        assert_eq!(read[0].exchange_side, OrderSide::Buy);

        let _ = fs::remove_dir_all(&dir);
    }
}
