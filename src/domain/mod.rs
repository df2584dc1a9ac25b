//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod ledger;
pub mod shared_ledger;
pub mod bot;
pub mod config_validation;
pub mod error;
