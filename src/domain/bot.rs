//! Polling loop: market data → strategy → shared ledger.
//!
//! The loop owns its counters in a `BotState` that is passed in and handed
//! back, and it stops when its `StopSignal` fires or a tick limit is reached.
//! Trade rejections and market data gaps are reported per tick and never end
//! the loop; a storage failure does.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::error::PaperTraderError;
use super::ledger::{Sizing, Trade};
use super::shared_ledger::SharedLedger;
use super::signal::Signal;
use super::strategy::TradingStrategy;
use crate::ports::ledger_store_port::LedgerStore;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub pair: String,
    pub interval: String,
    pub buy_sizing: Sizing,
    pub sell_sizing: Sizing,
    pub poll_interval: Duration,
    /// `None` runs until stopped.
    pub max_ticks: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            pair: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            buy_sizing: Sizing::Auto,
            sell_sizing: Sizing::Auto,
            poll_interval: Duration::from_secs(60),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Hold,
    Traded(Trade),
    /// The ledger refused the trade; balances are unchanged.
    Rejected { signal: Signal, reason: String },
    /// No usable data this tick.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotState {
    pub ticks: u64,
    pub trades: u64,
    pub rejections: u64,
    pub skipped: u64,
    pub last_signal: Option<Signal>,
}

impl BotState {
    pub fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Hold => self.last_signal = Some(Signal::Hold),
            TickOutcome::Traded(trade) => {
                self.trades += 1;
                self.last_signal = Some(match trade.side {
                    super::ledger::Side::Buy => Signal::Buy,
                    super::ledger::Side::Sell => Signal::Sell,
                });
            }
            TickOutcome::Rejected { signal, .. } => {
                self.rejections += 1;
                self.last_signal = Some(*signal);
            }
            TickOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Sending half of a stop request.
#[derive(Debug, Clone)]
pub struct StopHandle(Sender<()>);

impl StopHandle {
    pub fn stop(&self) {
        // The loop may already be gone; nothing to stop then.
        let _ = self.0.send(());
    }
}

/// Receiving half, owned by the polling loop. Fires on `StopHandle::stop`
/// or once every handle has been dropped.
#[derive(Debug)]
pub struct StopSignal {
    rx: Receiver<()>,
    stopped: bool,
}

impl StopSignal {
    pub fn is_stopped(&mut self) -> bool {
        if !self.stopped {
            self.stopped = match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => true,
                Err(TryRecvError::Empty) => false,
            };
        }
        self.stopped
    }

    /// Sleep up to `timeout`, waking early on a stop request.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if !self.stopped {
            self.stopped = match self.rx.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            };
        }
        self.stopped
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = mpsc::channel();
    (
        StopHandle(tx),
        StopSignal {
            rx,
            stopped: false,
        },
    )
}

/// One poll: fetch, evaluate, and trade on BUY/SELL at the live price.
pub fn run_tick<S: LedgerStore>(
    config: &BotConfig,
    strategy: &dyn TradingStrategy,
    market: &dyn MarketDataPort,
    ledger: &SharedLedger<S>,
) -> Result<TickOutcome, PaperTraderError> {
    let series = match market.get_price_series(&config.pair, &config.interval) {
        Ok(s) => s,
        Err(e) => {
            return Ok(TickOutcome::Skipped {
                reason: e.to_string(),
            });
        }
    };

    let rows = match strategy.compute_indicators(&series) {
        Ok(rows) => rows,
        Err(e) => {
            return Ok(TickOutcome::Skipped {
                reason: e.to_string(),
            });
        }
    };

    let signal = strategy.check_signal(&rows);
    if let Some(last) = rows.last() {
        debug!(
            close = last.candle.close,
            short_ma = ?last.short_ma,
            long_ma = ?last.long_ma,
            %signal,
            "indicators evaluated"
        );
    }
    if !signal.is_actionable() {
        return Ok(TickOutcome::Hold);
    }

    let price = match market.get_current_price(&config.pair) {
        Ok(p) if p > 0.0 => p,
        Ok(_) => {
            return Ok(TickOutcome::Skipped {
                reason: format!("no current price for {}", config.pair),
            });
        }
        Err(e) => {
            return Ok(TickOutcome::Skipped {
                reason: e.to_string(),
            });
        }
    };

    match ledger.execute(signal, price, config.buy_sizing, config.sell_sizing) {
        Ok(Some(trade)) => Ok(TickOutcome::Traded(trade)),
        Ok(None) => Ok(TickOutcome::Hold),
        Err(e) if e.is_trade_rejection() => Ok(TickOutcome::Rejected {
            signal,
            reason: e.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// Poll until stopped or `max_ticks` is reached. Returns the final state.
pub fn run_loop<S: LedgerStore>(
    mut state: BotState,
    config: &BotConfig,
    strategy: &dyn TradingStrategy,
    market: &dyn MarketDataPort,
    ledger: &SharedLedger<S>,
    stop: &mut StopSignal,
) -> Result<BotState, PaperTraderError> {
    info!(pair = %config.pair, strategy = %strategy.name(), "bot started");

    let limit_reached = |state: &BotState| config.max_ticks.is_some_and(|max| state.ticks >= max);

    while !stop.is_stopped() && !limit_reached(&state) {
        let outcome = match run_tick(config, strategy, market, ledger) {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "tick failed, stopping");
                return Err(e);
            }
        };

        match &outcome {
            TickOutcome::Hold => debug!("hold"),
            TickOutcome::Traded(_) => {}
            TickOutcome::Rejected { signal, reason } => {
                warn!(%signal, %reason, "trade rejected")
            }
            TickOutcome::Skipped { reason } => warn!(%reason, "tick skipped"),
        }
        state.record(&outcome);

        if limit_reached(&state) || stop.wait(config.poll_interval) {
            break;
        }
    }

    info!(
        ticks = state.ticks,
        trades = state.trades,
        rejections = state.rejections,
        skipped = state.skipped,
        "bot stopped"
    );
    Ok(state)
}
