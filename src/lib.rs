//! Bit Miner Bot Library
//!
//! A Telegram bot that simulates a passive BTC mining reward balance.
//!
//! This crate provides the core functionality for:
//! - Accruing a per-user balance from elapsed wall-clock time
//! - Quoting the BTC/USD price with caching and fallback
//! - Mapping bot events (start, button presses, text) to ledger operations
//! - Serving the bot over long polling or a webhook

pub mod commands;
pub mod config;
pub mod ledger;
pub mod oracle;
pub mod telegram;
