//! CSV candle replay and trade export.
//!
//! Candle files carry a header row and the columns
//! `open_time,close_time,open,high,low,close,volume`; times are RFC 3339 or
//! epoch milliseconds. `CsvReplayAdapter` reveals one more candle on every
//! `get_price_series` call, which lets the bot loop run against recorded data.

use crate::domain::candle::{Candle, PriceSeries};
use crate::domain::error::PaperTraderError;
use crate::domain::ledger::Trade;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct CsvReplayAdapter {
    pair: String,
    candles: Vec<Candle>,
    visible: AtomicUsize,
}

impl CsvReplayAdapter {
    /// `initial_visible` candles are shown on the first poll (at least one).
    pub fn new(pair: &str, candles: Vec<Candle>, initial_visible: usize) -> Self {
        let start = initial_visible.clamp(1, candles.len().max(1)) - 1;
        Self {
            pair: pair.to_string(),
            candles,
            visible: AtomicUsize::new(start),
        }
    }

    pub fn from_file<P: AsRef<Path>>(
        path: P,
        pair: &str,
        initial_visible: usize,
    ) -> Result<Self, PaperTraderError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PaperTraderError::MarketData {
            pair: pair.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let candles = parse_candles(&content, pair)?;
        Ok(Self::new(pair, candles, initial_visible))
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Polls left before every candle has been revealed.
    pub fn remaining(&self) -> usize {
        self.candles
            .len()
            .saturating_sub(self.visible.load(Ordering::SeqCst))
    }

    fn check_pair(&self, pair: &str) -> Result<(), PaperTraderError> {
        if pair != self.pair {
            return Err(PaperTraderError::MarketData {
                pair: pair.to_string(),
                reason: format!("replay file holds {}", self.pair),
            });
        }
        Ok(())
    }
}

impl MarketDataPort for CsvReplayAdapter {
    fn get_price_series(
        &self,
        pair: &str,
        interval: &str,
    ) -> Result<PriceSeries, PaperTraderError> {
        self.check_pair(pair)?;
        if self.candles.is_empty() {
            return Err(PaperTraderError::MarketData {
                pair: pair.to_string(),
                reason: "no candles".into(),
            });
        }
        let len = self.candles.len();
        let shown = self
            .visible
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some((v + 1).min(len)))
            .map(|prev| (prev + 1).min(len))
            .unwrap_or(len);
        Ok(PriceSeries::new(
            pair,
            interval,
            self.candles[..shown].to_vec(),
        ))
    }

    fn get_current_price(&self, pair: &str) -> Result<f64, PaperTraderError> {
        self.check_pair(pair)?;
        let shown = self.visible.load(Ordering::SeqCst).min(self.candles.len());
        Ok(shown
            .checked_sub(1)
            .map(|i| self.candles[i].close)
            .unwrap_or(0.0))
    }
}

fn parse_time(value: &str, column: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ms) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| format!("{} out of range: {}", column, ms));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid {}: {}", column, e))
}

fn parse_price(record: &csv::StringRecord, idx: usize, column: &str) -> Result<f64, String> {
    record
        .get(idx)
        .ok_or_else(|| format!("missing {} column", column))?
        .trim()
        .parse()
        .map_err(|e| format!("invalid {} value: {}", column, e))
}

/// Parse candle rows, oldest first. A row without a usable close is an
/// `InvalidInput`; any other malformed row is a `MarketData` error.
pub fn parse_candles(content: &str, pair: &str) -> Result<Vec<Candle>, PaperTraderError> {
    let market_err = |reason: String| PaperTraderError::MarketData {
        pair: pair.to_string(),
        reason,
    };

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| market_err(format!("CSV parse error: {}", e)))?;

        let open_time = record
            .get(0)
            .ok_or_else(|| "missing open_time column".to_string())
            .and_then(|v| parse_time(v, "open_time"))
            .map_err(market_err)?;
        let close_time = record
            .get(1)
            .ok_or_else(|| "missing close_time column".to_string())
            .and_then(|v| parse_time(v, "close_time"))
            .map_err(market_err)?;
        let open = parse_price(&record, 2, "open").map_err(market_err)?;
        let high = parse_price(&record, 3, "high").map_err(market_err)?;
        let low = parse_price(&record, 4, "low").map_err(market_err)?;
        let close = parse_price(&record, 5, "close").map_err(|reason| {
            PaperTraderError::InvalidInput {
                reason: format!("row {}: {}", row, reason),
            }
        })?;
        let volume = parse_price(&record, 6, "volume").map_err(market_err)?;

        let candle = Candle {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        };
        if !candle.is_well_formed() {
            return Err(market_err(format!("row {}: malformed candle", row)));
        }
        candles.push(candle);
    }

    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

/// Write `trades` as CSV with a header row.
pub fn write_trades_csv<W: io::Write>(trades: &[Trade], writer: W) -> Result<(), PaperTraderError> {
    let to_err = |e: csv::Error| PaperTraderError::Storage {
        reason: format!("CSV write error: {}", e),
    };
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "timestamp",
        "side",
        "price",
        "quantity",
        "amount",
        "fiat_balance",
        "asset_balance",
    ])
    .map_err(to_err)?;
    for t in trades {
        wtr.write_record([
            t.timestamp.to_rfc3339(),
            t.side.to_string(),
            t.price.to_string(),
            t.quantity.to_string(),
            t.amount.to_string(),
            t.fiat_balance.to_string(),
            t.asset_balance.to_string(),
        ])
        .map_err(to_err)?;
    }
    wtr.flush()?;
    Ok(())
}
