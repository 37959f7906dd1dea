//! Long polling and webhook transports.

use std::net::SocketAddr;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use teloxide::RequestError;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::dispatch::{Command, schema};
use crate::commands::ActionHandler;
use crate::config::{BotSettings, ConfigError, TransportMode, mask_token};
use crate::oracle::PriceOracle;

/// Errors that prevent the bot from serving updates.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to set up webhook: {0}")]
    Webhook(#[from] RequestError),
}

/// Serves updates until Ctrl+C using the configured transport.
///
/// # Errors
///
/// Returns an error if the webhook cannot be configured. Errors inside
/// individual updates are logged and do not stop the bot.
pub async fn run<O: PriceOracle + 'static>(
    bot: Bot,
    handler: Arc<ActionHandler<O>>,
    settings: &BotSettings,
) -> Result<(), TransportError> {
    register_commands(&bot).await;

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema::<O>())
        .dependencies(dptree::deps![handler])
        .default_handler(|update| async move {
            debug!("Unhandled update: {:?}", update.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build();

    match settings.transport {
        TransportMode::Polling => {
            info!("Receiving updates via long polling");
            dispatcher.dispatch().await;
        }
        TransportMode::Webhook => {
            let raw_url = settings.webhook_url()?;
            let url = reqwest::Url::parse(&raw_url)
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            let address = SocketAddr::from(([0, 0, 0, 0], settings.port));

            let listener = webhooks::axum(bot, webhooks::Options::new(address, url)).await?;
            info!(
                "Receiving updates via webhook on {} ({})",
                address,
                raw_url.replace(&settings.token, &mask_token(&settings.token))
            );

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
    }

    Ok(())
}

/// Publishes the command menu; failure is not fatal.
async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => debug!("Registered bot commands"),
        Err(e) => warn!("Failed to register bot commands: {}", e),
    }
}
