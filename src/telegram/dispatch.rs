//! Update dispatch tree and endpoints.

use std::sync::Arc;

use chrono::Utc;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::commands::{ActionHandler, BotAction, Keyboard, Reply, StartArgs};
use crate::oracle::PriceOracle;

/// Slash commands understood by the bot.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    /// `/start [referrer]`; deep links pass the referrer id as argument.
    #[command(description = "open the mining menu")]
    Start(String),
}

/// Builds the dispatch tree: commands, free text, and button presses.
pub fn schema<O: PriceOracle + 'static>() -> UpdateHandler<RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(on_command::<O>),
                )
                .branch(dptree::endpoint(on_text::<O>)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback::<O>))
}

/// Converts a keyboard into Telegram inline markup.
#[must_use]
pub fn keyboard_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows().into_iter().map(|row| {
        row.into_iter()
            .map(|action| InlineKeyboardButton::callback(action.label(), action.as_str()))
    }))
}

async fn on_command<O: PriceOracle + 'static>(
    bot: Bot,
    msg: Message,
    cmd: Command,
    handler: Arc<ActionHandler<O>>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let Command::Start(arg) = cmd;
    let args = StartArgs::parse(&arg, user.id.0);
    let reply = handler.handle_start(user.id.0, args, Utc::now()).await;

    send_reply(&bot, msg.chat.id, reply).await
}

async fn on_text<O: PriceOracle + 'static>(
    bot: Bot,
    msg: Message,
    handler: Arc<ActionHandler<O>>,
) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };

    // Unknown commands are not wallet candidates.
    if text.starts_with('/') {
        debug!("Ignoring unknown command from user {}", user.id);
        return Ok(());
    }

    let reply = handler.handle_text(user.id.0, text, Utc::now()).await;
    send_reply(&bot, msg.chat.id, reply).await
}

async fn on_callback<O: PriceOracle + 'static>(
    bot: Bot,
    q: CallbackQuery,
    handler: Arc<ActionHandler<O>>,
) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(action) = q.data.as_deref().and_then(BotAction::parse) else {
        debug!("Ignoring callback data {:?} from user {}", q.data, q.from.id);
        return Ok(());
    };

    let user = q.from.id;
    let reply = handler.handle_action(user.0, action, Utc::now()).await;

    match q.regular_message() {
        Some(message) => edit_reply(&bot, message.chat.id, message.id, reply).await,
        None => send_reply(&bot, ChatId::from(user), reply).await,
    }
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    bot.send_message(chat_id, reply.text)
        .reply_markup(keyboard_markup(reply.keyboard))
        .await?;
    Ok(())
}

async fn edit_reply(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    reply: Reply,
) -> ResponseResult<()> {
    let result = bot
        .edit_message_text(chat_id, message_id, reply.text)
        .reply_markup(keyboard_markup(reply.keyboard))
        .await;

    match result {
        Ok(_) => Ok(()),
        // Pressing the same button twice within a second renders identical text.
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Message {} unchanged, skipping edit", message_id.0);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
