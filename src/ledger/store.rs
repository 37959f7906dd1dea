//! Ledger service owning every account.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{Account, Accrual};

/// Platform user identifier.
pub type UserId = u64;

/// Wallet text did not match any accepted address prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a recognised BTC address: {0}")]
pub struct WalletRejected(pub String);

/// In-memory collection of accounts keyed by user.
///
/// The map lock is only held to look up or insert an entry. Each account
/// sits behind its own mutex, so work on one user never waits on another
/// while overlapping events from the same user are serialized.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: RwLock<HashMap<UserId, Arc<Mutex<Account>>>>,
}

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account cell for `user`, creating it at `now` if needed.
    async fn entry(&self, user: UserId, now: DateTime<Utc>) -> Arc<Mutex<Account>> {
        if let Some(cell) = self.accounts.read().await.get(&user) {
            return Arc::clone(cell);
        }

        let mut accounts = self.accounts.write().await;
        let cell = accounts.entry(user).or_insert_with(|| {
            info!("Opening account for user {}", user);
            Arc::new(Mutex::new(Account::new(now)))
        });
        Arc::clone(cell)
    }

    /// Returns the account for `user`, creating an empty one if absent.
    pub async fn ensure(&self, user: UserId, now: DateTime<Utc>) -> Account {
        let cell = self.entry(user, now).await;
        let account = cell.lock().await;
        account.clone()
    }

    /// Returns a copy of the account without creating it.
    #[cfg(test)]
    pub async fn get(&self, user: UserId) -> Option<Account> {
        let cell = self.accounts.read().await.get(&user).map(Arc::clone)?;
        let account = cell.lock().await;
        Some(account.clone())
    }

    /// Runs `f` with exclusive access to the account of `user`.
    ///
    /// The account is created first if needed.
    pub async fn update<R>(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Account) -> R,
    ) -> R {
        let cell = self.entry(user, now).await;
        let mut account = cell.lock().await;
        f(&mut *account)
    }

    /// Materializes accrual for `user` at `now`, then runs `f` on the
    /// accrued account.
    ///
    /// Both steps happen under one account lock, so overlapping events from
    /// the same user cannot credit the same interval twice.
    pub async fn with_accrued<R>(
        &self,
        user: UserId,
        price: f64,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Account, Accrual) -> R,
    ) -> R {
        self.update(user, now, |account| {
            let accrual = account.accrue(price, now);
            debug!(
                "Accrued {:.8} BTC for user {} over {:.1}s",
                accrual.credited, user, accrual.elapsed_secs
            );
            f(account, accrual)
        })
        .await
    }

    /// Registers a payout wallet for `user`.
    pub async fn set_wallet(
        &self,
        user: UserId,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WalletRejected> {
        self.update(user, now, |account| {
            if account.set_wallet(address) {
                info!("User {} registered a wallet", user);
                Ok(())
            } else {
                debug!("Rejected wallet text from user {}", user);
                Err(WalletRejected(address.to_owned()))
            }
        })
        .await
    }

    /// Credits `referrer` with `bonus_usd` converted at `price`.
    ///
    /// Returns the BTC credited.
    pub async fn credit_referral(
        &self,
        referrer: UserId,
        bonus_usd: f64,
        price: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        self.update(referrer, now, |account| {
            let credited = account.credit_referral(bonus_usd, price);
            info!(
                "Credited referrer {} with {:.8} BTC (total referral bonus {:.8})",
                referrer, credited, account.referral_bonus
            );
            credited
        })
        .await
    }

    /// Number of accounts opened so far.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }
}
