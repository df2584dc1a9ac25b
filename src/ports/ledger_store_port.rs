//! Ledger persistence port trait.

use crate::domain::error::PaperTraderError;
use crate::domain::ledger::{LedgerState, Trade};

pub trait LedgerStore {
    /// Stored state, or the empty default when nothing usable is stored.
    /// Absence and corruption are not errors.
    fn load(&self) -> LedgerState;

    /// Replace the stored state as one unit; readers never see a partial write.
    fn save(&self, state: &LedgerState) -> Result<(), PaperTraderError>;

    /// Read-modify-write of the whole state. Batch through `save` when
    /// recording many trades.
    fn append_trade(&self, trade: &Trade) -> Result<(), PaperTraderError> {
        let mut state = self.load();
        state.trades.push(trade.clone());
        self.save(&state)
    }
}
