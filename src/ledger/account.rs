//! Per-user account record and the accrual arithmetic.

use chrono::{DateTime, Utc};

use super::{
    EARN_USD_PER_INTERVAL, INTERVAL_SECS, MIN_WITHDRAW_USD, PROGRESS_SEGMENTS, WALLET_PREFIXES,
    WITHDRAW_FEE_USD,
};

/// Mining account of a single user.
///
/// All `price` arguments are BTC/USD quotes and must be positive; the
/// oracle never hands out anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Accrued balance in BTC.
    pub balance: f64,

    /// Payout address, unset until the user sends one.
    pub wallet: Option<String>,

    /// When accrual was last materialized into `balance`.
    pub last_check: DateTime<Utc>,

    /// Total BTC credited through referrals.
    pub referral_bonus: f64,
}

/// Outcome of a single accrual step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accrual {
    /// Seconds since the previous accrual.
    pub elapsed_secs: f64,

    /// BTC added to the balance.
    pub credited: f64,
}

/// Why a withdrawal can or cannot proceed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WithdrawEligibility {
    /// Threshold met and a wallet is on file.
    Eligible {
        /// Fee in BTC that must be paid before confirming.
        fee_btc: f64,
    },
    /// USD value is below [`MIN_WITHDRAW_USD`].
    BelowMinimum {
        /// Current USD value of the balance.
        usd_value: f64,
    },
    /// No payout wallet registered.
    NoWallet,
}

impl Account {
    /// Creates an empty account whose accrual clock starts at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            balance: 0.0,
            wallet: None,
            last_check: now,
            referral_bonus: 0.0,
        }
    }

    /// Seconds elapsed since the last accrual, clamped at zero.
    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_check)
            .to_std()
            .map_or(0.0, |d| d.as_secs_f64())
    }

    /// Materializes the time elapsed since `last_check` into the balance.
    ///
    /// `last_check` never moves backwards: a `now` older than it credits
    /// nothing and leaves it in place, so an event that arrives late cannot
    /// reopen an interval that was already credited.
    pub fn accrue(&mut self, price: f64, now: DateTime<Utc>) -> Accrual {
        let elapsed_secs = self.elapsed_secs(now);
        let credited = btc_per_second(price) * elapsed_secs;

        self.balance += credited;
        self.last_check = self.last_check.max(now);

        Accrual {
            elapsed_secs,
            credited,
        }
    }

    /// USD value of the balance at `price`.
    #[must_use]
    pub fn usd_value(&self, price: f64) -> f64 {
        self.balance * price
    }

    /// Whether a withdrawal may be started.
    #[must_use]
    pub fn can_withdraw(&self, price: f64) -> bool {
        matches!(
            self.withdraw_eligibility(price),
            WithdrawEligibility::Eligible { .. }
        )
    }

    /// Checks the withdrawal threshold first, then the wallet.
    #[must_use]
    pub fn withdraw_eligibility(&self, price: f64) -> WithdrawEligibility {
        let usd_value = self.usd_value(price);
        if usd_value < MIN_WITHDRAW_USD {
            WithdrawEligibility::BelowMinimum { usd_value }
        } else if self.wallet.is_none() {
            WithdrawEligibility::NoWallet
        } else {
            WithdrawEligibility::Eligible {
                fee_btc: withdraw_fee(price),
            }
        }
    }

    /// Pays out the balance minus the fee and zeroes it.
    ///
    /// Fee payment is taken on trust; nothing here checks eligibility.
    /// Returns the withdrawn amount in BTC.
    pub fn confirm_withdraw(&mut self, price: f64) -> f64 {
        let withdrawn = (self.balance - withdraw_fee(price)).max(0.0);
        self.balance = 0.0;
        withdrawn
    }

    /// Stores `address` if it looks like a BTC address.
    ///
    /// Returns `false` and leaves the account untouched otherwise.
    pub fn set_wallet(&mut self, address: &str) -> bool {
        if !is_wallet_address(address) {
            return false;
        }
        self.wallet = Some(address.to_owned());
        true
    }

    /// Credits a referral bonus of `bonus_usd` converted at `price`.
    ///
    /// Returns the BTC credited.
    pub fn credit_referral(&mut self, bonus_usd: f64, price: f64) -> f64 {
        let credited = bonus_usd / price;
        self.balance += credited;
        self.referral_bonus += credited;
        credited
    }
}

/// BTC earned per second at `price`.
#[must_use]
pub fn btc_per_second(price: f64) -> f64 {
    EARN_USD_PER_INTERVAL / price / INTERVAL_SECS
}

/// BTC equivalent of the flat withdrawal fee at `price`.
#[must_use]
pub fn withdraw_fee(price: f64) -> f64 {
    WITHDRAW_FEE_USD / price
}

/// Prefix check for legacy, P2SH and bech32 addresses.
#[must_use]
pub fn is_wallet_address(text: &str) -> bool {
    WALLET_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

/// Position inside the current accrual interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Fraction of the interval completed, in `[0, 1)`.
    pub fraction: f64,

    /// Filled bar segments out of [`PROGRESS_SEGMENTS`].
    pub filled: usize,

    /// Whole seconds until the interval completes.
    pub seconds_remaining: u64,
}

impl Progress {
    /// Derives progress from the elapsed time of the last accrual.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_elapsed(elapsed_secs: f64) -> Self {
        let into_interval = elapsed_secs.max(0.0) % INTERVAL_SECS;
        let fraction = into_interval / INTERVAL_SECS;
        let filled = ((fraction * PROGRESS_SEGMENTS as f64).floor() as usize).min(PROGRESS_SEGMENTS);
        let seconds_remaining = (INTERVAL_SECS - into_interval).max(0.0) as u64;

        Self {
            fraction,
            filled,
            seconds_remaining,
        }
    }

    /// Renders the bar with the given filled and empty symbols.
    #[must_use]
    pub fn render(&self, filled: &str, empty: &str) -> String {
        let mut bar = filled.repeat(self.filled);
        bar.push_str(&empty.repeat(PROGRESS_SEGMENTS - self.filled));
        bar
    }
}
