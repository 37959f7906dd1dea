//! Bit Miner Bot - Main Entry Point
//!
//! A Telegram bot that accrues a simulated BTC balance for every user
//! and serves it over long polling or a webhook.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::Bot;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bit_miner_bot::commands::ActionHandler;
use bit_miner_bot::config::{BotSettings, TransportMode, mask_token};
use bit_miner_bot::ledger::Ledger;
use bit_miner_bot::oracle::QuoteOracle;
use bit_miner_bot::telegram;

/// Telegram bot simulating a passive BTC mining reward balance.
#[derive(Parser, Debug)]
#[command(name = "bit_miner_bot")]
#[command(about = "Accrue a simulated BTC balance inside Telegram")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Update transport; overrides `BOT_TRANSPORT`.
    #[arg(short, long, value_enum)]
    transport: Option<TransportMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings =
        BotSettings::from_env().context("Failed to load bot configuration from environment")?;
    if let Some(transport) = args.transport {
        settings = settings.with_transport(transport);
    }

    info!(
        "Starting bit miner bot (token: {}, transport: {:?})",
        mask_token(&settings.token),
        settings.transport
    );

    let oracle = QuoteOracle::new(&settings.oracle).context("Failed to build price oracle")?;
    info!(
        "Price oracle: {} (timeout {:?}, cache ttl {:?}, fallback {:?})",
        settings.oracle.url, settings.oracle.timeout, settings.oracle.cache_ttl, settings.oracle.fallback
    );

    let settings = Arc::new(settings);
    let ledger = Arc::new(Ledger::new());
    let handler = Arc::new(ActionHandler::new(
        Arc::clone(&ledger),
        Arc::new(oracle),
        Arc::clone(&settings),
    ));

    let bot = Bot::new(&settings.token);

    telegram::run(bot, handler, &settings)
        .await
        .context("Bot stopped with an error")?;

    // Accounts are memory-only
    info!(
        "Shutting down, discarding {} in-memory accounts",
        ledger.len().await
    );

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
