//! Indicator rows for the crossover strategy.
//!
//! - `IndicatorRow`: a candle extended with its short and long averages
//! - `compute_indicators`: validates window sizes and builds one row per candle

pub mod sma;

use crate::domain::candle::{Candle, PriceSeries};
use crate::domain::error::PaperTraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub candle: Candle,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
}

impl IndicatorRow {
    /// Both averages, when the row can take part in a crossover comparison.
    pub fn averages(&self) -> Option<(f64, f64)> {
        match (self.short_ma, self.long_ma) {
            (Some(short), Some(long)) => Some((short, long)),
            _ => None,
        }
    }
}

pub fn validate_windows(short_period: usize, long_period: usize) -> Result<(), PaperTraderError> {
    if short_period == 0 || long_period == 0 {
        return Err(PaperTraderError::InvalidInput {
            reason: format!(
                "window sizes must be positive (short={}, long={})",
                short_period, long_period
            ),
        });
    }
    if short_period >= long_period {
        return Err(PaperTraderError::InvalidInput {
            reason: format!(
                "short window ({}) must be less than long window ({})",
                short_period, long_period
            ),
        });
    }
    Ok(())
}

/// One row per candle, each with both averages defined from the first row on.
pub fn compute_indicators(
    series: &PriceSeries,
    short_period: usize,
    long_period: usize,
) -> Result<Vec<IndicatorRow>, PaperTraderError> {
    validate_windows(short_period, long_period)?;

    if series.is_empty() {
        return Err(PaperTraderError::InvalidInput {
            reason: format!("price series for {} is empty", series.pair),
        });
    }

    if let Some(pos) = series.candles.iter().position(|c| !c.close.is_finite()) {
        return Err(PaperTraderError::InvalidInput {
            reason: format!("missing close price at row {}", pos),
        });
    }

    let closes = series.closes();
    let short = sma::rolling_mean(&closes, short_period);
    let long = sma::rolling_mean(&closes, long_period);

    let rows = series
        .candles
        .iter()
        .zip(short.into_iter().zip(long))
        .map(|(candle, (s, l))| IndicatorRow {
            candle: candle.clone(),
            short_ma: Some(s),
            long_ma: Some(l),
        })
        .collect();

    Ok(rows)
}
