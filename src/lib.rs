//! papertrader: a moving-average crossover bot trading against a simulated
//! ledger.
//!
//! Signal logic and the ledger live in [`domain`], the traits they depend on
//! in [`ports`], and file-backed implementations in [`adapters`]. [`cli`]
//! wires them into the `papertrader` binary.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
