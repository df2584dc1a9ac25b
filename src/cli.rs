//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;

use crate::adapters::csv_adapter::{write_trades_csv, CsvReplayAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::JsonFileStore;
use crate::domain::bot::{self, BotConfig, BotState, StopSignal};
use crate::domain::config_validation::{
    initial_capital, max_ticks, parse_sizing, poll_interval, require_string, validate_all,
    validate_bot_config, validate_storage_config, validate_strategy_config, window_sizes,
};
use crate::domain::error::PaperTraderError;
use crate::domain::ledger::Ledger;
use crate::domain::shared_ledger::SharedLedger;
use crate::domain::signal::Signal;
use crate::domain::strategy::{MovingAverageCrossover, TradingStrategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_store_port::LedgerStore;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Moving-average crossover paper trading bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the polling loop against the configured market data
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many polls (overrides [bot] max_ticks)
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Evaluate the strategy once and print the signal
    Signal {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show balances, portfolio value and recent trades
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 5)]
        trades: usize,
    },
    /// Export the trade history as CSV
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Resolved configuration for one bot.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bot: BotConfig,
    pub initial_capital: f64,
    pub short_window: usize,
    pub long_window: usize,
    pub ledger_path: PathBuf,
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub state: BotState,
    pub ledger: Ledger,
    pub last_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalReport {
    pub close: f64,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub signal: Signal,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run { config, max_ticks } => run_bot(&config, max_ticks),
        Command::Signal { config } => run_signal(&config),
        Command::Status { config, trades } => run_status(&config, trades),
        Command::Export { config, output } => run_export(&config, &output),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PaperTraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<Settings, PaperTraderError> {
    validate_bot_config(config)?;
    validate_strategy_config(config)?;
    validate_storage_config(config)?;

    let (short_window, long_window) = window_sizes(config)?;

    Ok(Settings {
        bot: BotConfig {
            pair: require_string(config, "bot", "pair")?.to_uppercase(),
            interval: config
                .get_value("bot", "interval")
                .unwrap_or_else(|| "1h".to_string()),
            buy_sizing: parse_sizing(config, "buy_sizing")?,
            sell_sizing: parse_sizing(config, "sell_sizing")?,
            poll_interval: poll_interval(config)?,
            max_ticks: max_ticks(config)?,
        },
        initial_capital: initial_capital(config)?,
        short_window,
        long_window,
        ledger_path: PathBuf::from(require_string(config, "storage", "ledger_path")?),
        csv_path: config.get_value("market_data", "csv_path").map(PathBuf::from),
    })
}

fn require_csv_path(settings: &Settings) -> Result<&Path, PaperTraderError> {
    settings
        .csv_path
        .as_deref()
        .ok_or_else(|| PaperTraderError::ConfigMissing {
            section: "market_data".into(),
            key: "csv_path".into(),
        })
}

/// Runs the loop over the CSV replay until `stop` fires, the tick limit is
/// reached, or, with no limit configured, every candle has been shown.
/// The first poll sees only the first candle, so every prefix of the file is
/// evaluated once.
pub fn run_bot_pipeline(
    settings: &Settings,
    max_ticks_override: Option<u64>,
    stop: &mut StopSignal,
) -> Result<RunSummary, PaperTraderError> {
    // Stage 1: strategy (window sizes already validated)
    let strategy = MovingAverageCrossover::new(settings.short_window, settings.long_window)?;

    // Stage 2: market data
    let csv_path = require_csv_path(settings)?;
    let market = CsvReplayAdapter::from_file(csv_path, &settings.bot.pair, 1)?;
    info!(
        path = %csv_path.display(),
        candles = market.len(),
        "loaded replay data"
    );

    // Stage 3: ledger, resumed from storage
    let store = JsonFileStore::new(&settings.ledger_path);
    let ledger = SharedLedger::open(store, settings.initial_capital)?;

    // Stage 4: poll
    let mut config = settings.bot.clone();
    config.max_ticks = max_ticks_override
        .or(config.max_ticks)
        .or(Some(market.remaining().max(1) as u64));
    let state = bot::run_loop(BotState::default(), &config, &strategy, &market, &ledger, stop)?;

    let last_price = market.get_current_price(&config.pair)?;
    Ok(RunSummary {
        state,
        ledger: ledger.snapshot(),
        last_price,
    })
}

fn run_bot(config_path: &Path, max_ticks: Option<u64>) -> Result<(), PaperTraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    let settings = build_settings(&adapter)?;

    let (handle, mut stop) = bot::stop_channel();
    ctrlc::set_handler(move || {
        info!("interrupt received, stopping after the current tick");
        handle.stop();
    })
    .map_err(|e| PaperTraderError::Io(std::io::Error::other(e.to_string())))?;

    let summary = run_bot_pipeline(&settings, max_ticks, &mut stop)?;
    let value = summary.ledger.total_value(summary.last_price)?;
    println!(
        "{} ticks, {} trades, {} rejected, {} skipped",
        summary.state.ticks, summary.state.trades, summary.state.rejections, summary.state.skipped
    );
    println!(
        "fiat {:.2} | asset {:.8} | value {:.2} @ {}",
        summary.ledger.fiat_balance(),
        summary.ledger.asset_balance(),
        value,
        summary.last_price
    );
    Ok(())
}

pub fn evaluate_signal(settings: &Settings) -> Result<SignalReport, PaperTraderError> {
    let strategy = MovingAverageCrossover::new(settings.short_window, settings.long_window)?;
    let csv_path = require_csv_path(settings)?;
    let market = CsvReplayAdapter::from_file(csv_path, &settings.bot.pair, usize::MAX)?;
    let series = market.get_price_series(&settings.bot.pair, &settings.bot.interval)?;
    let rows = strategy.compute_indicators(&series)?;
    let signal = strategy.check_signal(&rows);
    let last = rows.last().ok_or_else(|| PaperTraderError::InvalidInput {
        reason: "no indicator rows".into(),
    })?;
    Ok(SignalReport {
        close: last.candle.close,
        short_ma: last.short_ma,
        long_ma: last.long_ma,
        signal,
    })
}

fn run_signal(config_path: &Path) -> Result<(), PaperTraderError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter)?;
    let report = evaluate_signal(&settings)?;
    let fmt_ma = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
    println!(
        "{} close {} short_ma {} long_ma {} signal {}",
        settings.bot.pair,
        report.close,
        fmt_ma(report.short_ma),
        fmt_ma(report.long_ma),
        report.signal
    );
    Ok(())
}

/// Latest close from the configured CSV, if it can be read.
fn latest_price(settings: &Settings) -> Option<f64> {
    let path = settings.csv_path.as_deref()?;
    let market = CsvReplayAdapter::from_file(path, &settings.bot.pair, usize::MAX).ok()?;
    market
        .get_price_series(&settings.bot.pair, &settings.bot.interval)
        .ok()?
        .last_close()
}

pub fn format_status(ledger: &Ledger, pair: &str, price: Option<f64>, n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "pair:   {}", pair);
    let _ = writeln!(out, "fiat:   {:.2}", ledger.fiat_balance());
    let _ = writeln!(out, "asset:  {:.8}", ledger.asset_balance());
    match price.and_then(|p| ledger.total_value(p).ok()) {
        Some(value) => {
            let _ = writeln!(out, "value:  {:.2} @ {}", value, price.unwrap_or_default());
        }
        None => {
            let _ = writeln!(out, "value:  n/a (no price)");
        }
    }
    let _ = writeln!(out, "trades: {}", ledger.trades().len());
    for t in ledger.recent_trades(n) {
        let _ = writeln!(
            out,
            "  {} {:<4} {:.8} @ {} = {:.2}",
            t.timestamp.format("%Y-%m-%d %H:%M:%S"),
            t.side,
            t.quantity,
            t.price,
            t.amount
        );
    }
    out
}

fn run_status(config_path: &Path, n: usize) -> Result<(), PaperTraderError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter)?;
    let store = JsonFileStore::new(&settings.ledger_path);
    let ledger = Ledger::from_state(store.load(), settings.initial_capital)?;
    print!(
        "{}",
        format_status(&ledger, &settings.bot.pair, latest_price(&settings), n)
    );
    Ok(())
}

/// Writes the stored trade history to `output`; returns the trade count.
pub fn export_trades(settings: &Settings, output: &Path) -> Result<usize, PaperTraderError> {
    let state = JsonFileStore::new(&settings.ledger_path).load();
    let file = File::create(output)?;
    write_trades_csv(&state.trades, BufWriter::new(file))?;
    Ok(state.trades.len())
}

fn run_export(config_path: &Path, output: &Path) -> Result<(), PaperTraderError> {
    let adapter = load_config(config_path)?;
    let settings = build_settings(&adapter)?;
    let count = export_trades(&settings, output)?;
    println!("exported {} trades to {}", count, output.display());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), PaperTraderError> {
    let adapter = load_config(config_path)?;
    validate_all(&adapter)?;
    println!("config OK");
    Ok(())
}
