#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use papertrader::domain::candle::{Candle, PriceSeries};
use papertrader::domain::error::PaperTraderError;
use papertrader::domain::ledger::LedgerState;
use papertrader::ports::ledger_store_port::LedgerStore;
use papertrader::ports::market_data_port::MarketDataPort;
use std::sync::Mutex;

pub const PAIR: &str = "BTCUSDT";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_candle(index: usize, close: f64) -> Candle {
    let open_time = t0() + Duration::hours(index as i64);
    Candle {
        open_time,
        close_time: open_time + Duration::hours(1) - Duration::milliseconds(1),
        open: close,
        high: close + 1.0,
        low: (close - 1.0).max(0.0),
        close,
        volume: 10.0,
    }
}

pub fn make_series(closes: &[f64]) -> PriceSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(i, c))
        .collect();
    PriceSeries::new(PAIR, "1h", candles)
}

/// CSV text in the replay format, one hourly candle per close.
pub fn candles_csv(closes: &[f64]) -> String {
    let mut out = String::from("open_time,close_time,open,high,low,close,volume\n");
    for (i, &c) in closes.iter().enumerate() {
        let candle = make_candle(i, c);
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            candle.open_time.timestamp_millis(),
            candle.close_time.timestamp_millis(),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        ));
    }
    out
}

/// Serves a fixed series; `fail` makes every call error.
pub struct MockMarketData {
    pub series: PriceSeries,
    pub fail: Option<String>,
}

impl MockMarketData {
    pub fn new(closes: &[f64]) -> Self {
        Self {
            series: make_series(closes),
            fail: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            series: make_series(&[]),
            fail: Some(reason.to_string()),
        }
    }

    fn check(&self, pair: &str) -> Result<(), PaperTraderError> {
        match &self.fail {
            Some(reason) => Err(PaperTraderError::MarketData {
                pair: pair.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockMarketData {
    fn get_price_series(
        &self,
        pair: &str,
        _interval: &str,
    ) -> Result<PriceSeries, PaperTraderError> {
        self.check(pair)?;
        Ok(self.series.clone())
    }

    fn get_current_price(&self, pair: &str) -> Result<f64, PaperTraderError> {
        self.check(pair)?;
        Ok(self.series.last_close().unwrap_or(0.0))
    }
}

/// In-memory store that counts saves and can be told to fail them.
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<LedgerState>,
    pub saves: Mutex<usize>,
    pub fail_saves: bool,
}

impl MemoryStore {
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> LedgerState {
        self.state.lock().unwrap().clone()
    }

    fn save(&self, state: &LedgerState) -> Result<(), PaperTraderError> {
        if self.fail_saves {
            return Err(PaperTraderError::Storage {
                reason: "disk full".into(),
            });
        }
        *self.state.lock().unwrap() = state.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}
