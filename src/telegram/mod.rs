//! Telegram Bot API integration.
//!
//! Wires the action handler into a teloxide dispatcher and serves it over
//! long polling or a webhook.

mod dispatch;
mod transport;

pub use dispatch::{Command, keyboard_markup, schema};
pub use transport::{TransportError, run};
