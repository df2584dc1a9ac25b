//! Ledger shared between the polling loop and status readers.
//!
//! The ledger and its store sit behind one mutex. A trade is validated,
//! applied, and persisted inside a single critical section; a failed save
//! rolls the in-memory ledger back so memory and disk never diverge.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use super::error::PaperTraderError;
use super::ledger::{Ledger, Side, Sizing, Trade};
use super::signal::Signal;
use crate::ports::ledger_store_port::LedgerStore;

struct Inner<S> {
    ledger: Ledger,
    store: S,
}

pub struct SharedLedger<S: LedgerStore> {
    inner: Mutex<Inner<S>>,
}

impl<S: LedgerStore> SharedLedger<S> {
    pub fn new(ledger: Ledger, store: S) -> Self {
        SharedLedger {
            inner: Mutex::new(Inner { ledger, store }),
        }
    }

    /// Resume from whatever `store` holds, falling back to `initial_fiat`.
    pub fn open(store: S, initial_fiat: f64) -> Result<Self, PaperTraderError> {
        let state = store.load();
        let ledger = Ledger::from_state(state, initial_fiat)?;
        info!(
            fiat = ledger.fiat_balance(),
            asset = ledger.asset_balance(),
            trades = ledger.trades().len(),
            "ledger opened"
        );
        Ok(Self::new(ledger, store))
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        // Mutations only happen after validation, so a poisoned guard still
        // holds a consistent ledger.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of balances and history.
    pub fn snapshot(&self) -> Ledger {
        self.lock().ledger.clone()
    }

    pub fn total_value(&self, current_price: f64) -> Result<f64, PaperTraderError> {
        self.lock().ledger.total_value(current_price)
    }

    /// Apply one trade and persist the resulting state.
    pub fn trade(&self, side: Side, price: f64, sizing: Sizing) -> Result<Trade, PaperTraderError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let checkpoint = inner.ledger.checkpoint();

        let trade = match side {
            Side::Buy => inner.ledger.buy_at(price, sizing, chrono::Utc::now())?,
            Side::Sell => inner.ledger.sell_at(price, sizing, chrono::Utc::now())?,
        };

        if let Err(e) = inner.store.save(&inner.ledger.state()) {
            warn!(error = %e, "persisting trade failed, rolling back");
            inner.ledger.restore(checkpoint);
            return Err(e);
        }

        info!(
            side = %trade.side,
            price = trade.price,
            quantity = trade.quantity,
            amount = trade.amount,
            fiat = trade.fiat_balance,
            asset = trade.asset_balance,
            "trade recorded"
        );
        Ok(trade)
    }

    /// Act on a strategy signal. HOLD does nothing.
    pub fn execute(
        &self,
        signal: Signal,
        price: f64,
        buy_sizing: Sizing,
        sell_sizing: Sizing,
    ) -> Result<Option<Trade>, PaperTraderError> {
        match signal {
            Signal::Buy => self.trade(Side::Buy, price, buy_sizing).map(Some),
            Signal::Sell => self.trade(Side::Sell, price, sell_sizing).map(Some),
            Signal::Hold => Ok(None),
        }
    }
}
