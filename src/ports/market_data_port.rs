//! Market data port trait.

use crate::domain::candle::PriceSeries;
use crate::domain::error::PaperTraderError;

pub trait MarketDataPort {
    /// Candle history for `pair`, oldest first. An unavailable or empty
    /// history is an error, never a panic.
    fn get_price_series(
        &self,
        pair: &str,
        interval: &str,
    ) -> Result<PriceSeries, PaperTraderError>;

    /// Latest price, `0.0` when no price is available.
    fn get_current_price(&self, pair: &str) -> Result<f64, PaperTraderError>;
}
