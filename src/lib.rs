//! Bera Wallet - a single-account wallet core for Berachain.
//!
//! This library provides:
//! - Transaction building with local validation, gas estimation and funds checks
//! - Signing, broadcast and bounded receipt waiting
//! - Periodic native and ERC-20 balance synchronization
//! - A simulated staking ledger with unbonding cooldowns

pub mod app;
pub mod config;
pub mod domain;
pub mod infra;
