//! Strategy contract and the moving-average crossover strategy.

use crate::domain::candle::PriceSeries;
use crate::domain::error::PaperTraderError;
use crate::domain::indicator::{self, IndicatorRow};
use crate::domain::signal::Signal;

/// Capability set every strategy provides to the bot loop.
pub trait TradingStrategy {
    fn name(&self) -> String;

    fn compute_indicators(
        &self,
        series: &PriceSeries,
    ) -> Result<Vec<IndicatorRow>, PaperTraderError>;

    /// Pure: identical rows always give the identical signal.
    fn check_signal(&self, rows: &[IndicatorRow]) -> Signal;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageCrossover {
    short_window: usize,
    long_window: usize,
}

impl MovingAverageCrossover {
    /// Rejects windows that `compute_indicators` would reject, so a bad
    /// configuration fails before any ledger exists.
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, PaperTraderError> {
        indicator::validate_windows(short_window, long_window)?;
        Ok(MovingAverageCrossover {
            short_window,
            long_window,
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }
}

impl TradingStrategy for MovingAverageCrossover {
    fn name(&self) -> String {
        format!("SMA crossover ({}/{})", self.short_window, self.long_window)
    }

    fn compute_indicators(
        &self,
        series: &PriceSeries,
    ) -> Result<Vec<IndicatorRow>, PaperTraderError> {
        indicator::compute_indicators(series, self.short_window, self.long_window)
    }

    fn check_signal(&self, rows: &[IndicatorRow]) -> Signal {
        check_signal(rows)
    }
}

/// Crossover of the last two rows that have both averages.
///
/// BUY on prev short <= long then last short > long (golden cross),
/// SELL on prev short >= long then last short < long (death cross),
/// HOLD otherwise or with fewer than two usable rows.
pub fn check_signal(rows: &[IndicatorRow]) -> Signal {
    let mut usable = rows.iter().rev().filter_map(IndicatorRow::averages);
    let (last, prev) = match (usable.next(), usable.next()) {
        (Some(last), Some(prev)) => (last, prev),
        _ => return Signal::Hold,
    };

    let (prev_short, prev_long) = prev;
    let (last_short, last_long) = last;

    if prev_short <= prev_long && last_short > last_long {
        Signal::Buy
    } else if prev_short >= prev_long && last_short < last_long {
        Signal::Sell
    } else {
        Signal::Hold
    }
}
