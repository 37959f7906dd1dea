//! Event handling module.
//!
//! Maps the start command, button presses and free text onto ledger
//! operations and builds the reply shown to the user.

mod handler;
mod types;

pub use handler::ActionHandler;
pub use types::{BotAction, Keyboard, Reply, StartArgs};
