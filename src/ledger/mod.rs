//! In-memory account ledger.
//!
//! Balances are never advanced by a timer. Every interaction materializes
//! the time elapsed since the previous one into the account balance.

mod account;
mod store;

pub use account::{
    Account, Accrual, Progress, WithdrawEligibility, btc_per_second, is_wallet_address,
    withdraw_fee,
};
pub use store::{Ledger, UserId, WalletRejected};

/// USD value credited per accrual interval.
pub const EARN_USD_PER_INTERVAL: f64 = 0.5;

/// Length of one accrual interval in seconds.
pub const INTERVAL_SECS: f64 = 120.0;

/// Minimum USD value required to start a withdrawal.
pub const MIN_WITHDRAW_USD: f64 = 500.0;

/// Flat USD fee charged on withdrawal.
pub const WITHDRAW_FEE_USD: f64 = 100.0;

/// USD credited to a referrer for each referred start.
pub const REFERRAL_BONUS_USD: f64 = 0.10;

/// Number of segments in the progress bar.
pub const PROGRESS_SEGMENTS: usize = 10;

/// Prefixes accepted for payout wallet addresses.
pub const WALLET_PREFIXES: [&str; 3] = ["1", "3", "bc1"];
