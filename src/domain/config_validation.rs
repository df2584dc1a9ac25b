//! Configuration validation.
//!
//! Runs before any ledger is created, so bad settings abort start-up.

use crate::domain::error::PaperTraderError;
use crate::domain::indicator::validate_windows;
use crate::domain::ledger::Sizing;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;
use std::time::Duration;

pub fn validate_bot_config(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    validate_pair(config)?;
    initial_capital(config)?;
    poll_interval(config)?;
    max_ticks(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    window_sizes(config)?;
    parse_sizing(config, "buy_sizing")?;
    parse_sizing(config, "sell_sizing")?;
    Ok(())
}

pub fn validate_storage_config(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    require_string(config, "storage", "ledger_path").map(|_| ())
}

pub fn validate_market_data_config(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    require_string(config, "market_data", "csv_path").map(|_| ())
}

/// Everything the `run` command needs.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    validate_bot_config(config)?;
    validate_strategy_config(config)?;
    validate_storage_config(config)?;
    validate_market_data_config(config)?;
    Ok(())
}

pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, PaperTraderError> {
    config
        .get_value(section, key)
        .ok_or_else(|| PaperTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Missing key means `auto`.
pub fn parse_sizing(config: &dyn ConfigPort, key: &str) -> Result<Sizing, PaperTraderError> {
    match config.get_value("strategy", key) {
        None => Ok(Sizing::Auto),
        Some(s) => s.parse().map_err(|reason| PaperTraderError::ConfigInvalid {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason,
        }),
    }
}

fn validate_pair(config: &dyn ConfigPort) -> Result<(), PaperTraderError> {
    let pair = require_string(config, "bot", "pair")?;
    if !pair.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "bot",
            "pair",
            "pair must be alphanumeric, e.g. BTCUSDT".to_string(),
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> PaperTraderError {
    PaperTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

/// `None` when the key is absent; a present value must parse.
fn parse_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, PaperTraderError> {
    match config.get_value(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("expected {}, got '{}'", expected, raw))),
    }
}

pub fn initial_capital(config: &dyn ConfigPort) -> Result<f64, PaperTraderError> {
    let value: f64 = parse_value(config, "bot", "initial_capital", "a number")?.ok_or_else(|| {
        PaperTraderError::ConfigMissing {
            section: "bot".to_string(),
            key: "initial_capital".to_string(),
        }
    })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "bot",
            "initial_capital",
            format!("initial_capital must be positive, got {}", value),
        ));
    }
    Ok(value)
}

/// Defaults to 60 seconds.
pub fn poll_interval(config: &dyn ConfigPort) -> Result<Duration, PaperTraderError> {
    let secs = parse_value(config, "bot", "poll_interval_secs", "whole seconds >= 0")?;
    Ok(Duration::from_secs(secs.unwrap_or(60)))
}

/// 0 or absent means unlimited.
pub fn max_ticks(config: &dyn ConfigPort) -> Result<Option<u64>, PaperTraderError> {
    let ticks: Option<u64> =
        parse_value(config, "bot", "max_ticks", "a tick count >= 0 (0 = unlimited)")?;
    Ok(ticks.filter(|&n| n > 0))
}

fn window(config: &dyn ConfigPort, key: &str) -> Result<usize, PaperTraderError> {
    let value: usize = parse_value(config, "strategy", key, "a positive integer")?.ok_or_else(
        || PaperTraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: key.to_string(),
        },
    )?;
    if value == 0 {
        return Err(invalid("strategy", key, format!("{} must be positive", key)));
    }
    Ok(value)
}

/// Validated (short, long) windows.
pub fn window_sizes(config: &dyn ConfigPort) -> Result<(usize, usize), PaperTraderError> {
    let short = window(config, "short_window")?;
    let long = window(config, "long_window")?;
    validate_windows(short, long).map_err(|e| {
        let reason = match e {
            PaperTraderError::InvalidInput { reason } => reason,
            other => other.to_string(),
        };
        invalid("strategy", "long_window", reason)
    })?;
    Ok((short, long))
}
