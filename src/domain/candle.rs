//! OHLC candle and price series representation.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// close_time > open_time and every price >= 0.
    pub fn is_well_formed(&self) -> bool {
        self.close_time > self.open_time
            && [self.open, self.high, self.low, self.close]
                .iter()
                .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Candles for one pair and one interval, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub pair: String,
    pub interval: String,
    pub candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(pair: &str, interval: &str, candles: Vec<Candle>) -> Self {
        PriceSeries {
            pair: pair.to_string(),
            interval: interval.to_string(),
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}
