//! Bot action protocol and reply types.

use std::fmt;

use crate::ledger::UserId;

/// Button actions carried in callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    /// Explain how mining works.
    Mine,

    /// Show balance and progress to the next credit.
    Balance,

    /// Start a withdrawal (threshold and wallet checks, fee prompt).
    Withdraw,

    /// Confirm a withdrawal after the fee was paid.
    ConfirmWithdraw,

    /// Ask the user to send a wallet address.
    AddWallet,

    /// Show information about the bot.
    About,

    /// Show the user's referral link.
    Referral,
}

impl BotAction {
    /// Every action, in keyboard order.
    pub const ALL: [Self; 7] = [
        Self::Mine,
        Self::Balance,
        Self::Withdraw,
        Self::ConfirmWithdraw,
        Self::AddWallet,
        Self::About,
        Self::Referral,
    ];

    /// Parses callback data into an action.
    ///
    /// Returns `None` for anything outside the protocol.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == data)
    }

    /// Callback data identifying this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mine => "mine",
            Self::Balance => "balance",
            Self::Withdraw => "withdraw",
            Self::ConfirmWithdraw => "confirm_withdraw",
            Self::AddWallet => "add_wallet",
            Self::About => "about",
            Self::Referral => "referral",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mine => "⛏ Mine",
            Self::Balance => "📊 Balance",
            Self::Withdraw => "📤 Withdraw",
            Self::ConfirmWithdraw => "Confirm Withdraw",
            Self::AddWallet => "➕ Add Wallet",
            Self::About => "ℹ️ About Info",
            Self::Referral => "👥 Referral",
        }
    }
}

impl fmt::Display for BotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument of the start command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartArgs {
    /// User who shared the referral link, if any.
    pub referrer: Option<UserId>,
}

impl StartArgs {
    /// Parses the start argument sent by `caller`.
    ///
    /// Only a numeric user id different from the caller counts as a
    /// referral; anything else is ignored.
    #[must_use]
    pub fn parse(arg: &str, caller: UserId) -> Self {
        let referrer = arg
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<UserId>().ok())
            .filter(|&referrer| referrer != caller);

        Self { referrer }
    }
}

/// Inline keyboard attached to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// The six-button main menu.
    Main,

    /// A single button confirming the withdrawal.
    ConfirmWithdraw,
}

impl Keyboard {
    /// Button rows, one button per row.
    #[must_use]
    pub fn rows(self) -> Vec<Vec<BotAction>> {
        let actions: &[BotAction] = match self {
            Self::Main => &[
                BotAction::Mine,
                BotAction::Balance,
                BotAction::Withdraw,
                BotAction::AddWallet,
                BotAction::About,
                BotAction::Referral,
            ],
            Self::ConfirmWithdraw => &[BotAction::ConfirmWithdraw],
        };
        actions.iter().map(|&action| vec![action]).collect()
    }
}

/// Text and keyboard to send back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message text.
    pub text: String,

    /// Keyboard shown under the message.
    pub keyboard: Keyboard,
}

impl Reply {
    /// Reply carrying the main menu.
    #[must_use]
    pub fn menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Main,
        }
    }

    /// Reply carrying the withdrawal confirmation button.
    #[must_use]
    pub fn confirm(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::ConfirmWithdraw,
        }
    }
}
