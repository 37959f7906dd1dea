//! Action handler implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::types::{BotAction, Reply, StartArgs};
use crate::config::BotSettings;
use crate::ledger::{
    Account, Accrual, EARN_USD_PER_INTERVAL, Ledger, MIN_WITHDRAW_USD, Progress,
    REFERRAL_BONUS_USD, UserId, WITHDRAW_FEE_USD, WithdrawEligibility,
};
use crate::oracle::PriceOracle;

const PROGRESS_FILLED: &str = "🔺";
const PROGRESS_EMPTY: &str = "▫️";

/// Turns bot events into ledger operations and replies.
pub struct ActionHandler<O> {
    /// Account ledger shared by all events.
    ledger: Arc<Ledger>,

    /// BTC/USD price source.
    oracle: Arc<O>,

    /// Bot settings (referral link, fee address).
    settings: Arc<BotSettings>,
}

impl<O: PriceOracle> ActionHandler<O> {
    /// Creates a new action handler.
    #[must_use]
    pub const fn new(ledger: Arc<Ledger>, oracle: Arc<O>, settings: Arc<BotSettings>) -> Self {
        Self {
            ledger,
            oracle,
            settings,
        }
    }

    /// Gets a reference to the ledger.
    #[cfg(test)]
    pub const fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Handles the start command.
    ///
    /// Opens the caller's account and credits the referrer, if any.
    pub async fn handle_start(&self, user: UserId, args: StartArgs, now: DateTime<Utc>) -> Reply {
        debug!("Start from user {} (referrer: {:?})", user, args.referrer);
        self.ledger.ensure(user, now).await;

        if let Some(referrer) = args.referrer {
            let price = self.oracle.current_price().await;
            self.ledger
                .credit_referral(referrer, REFERRAL_BONUS_USD, price, now)
                .await;
        }

        Reply::menu(format!(
            "👋 Welcome to Telegram Bit Miner! 🚀\n\
             ⏳ Earnings: ${EARN_USD_PER_INTERVAL:.2} every 2 minutes continuously.\n\
             Tap buttons below to start:"
        ))
    }

    /// Handles a button press.
    ///
    /// Accrual is materialized before the action runs, under the same
    /// account lock.
    pub async fn handle_action(&self, user: UserId, action: BotAction, now: DateTime<Utc>) -> Reply {
        let price = self.oracle.current_price().await;
        debug!("Action {} from user {} at price {:.2}", action, user, price);

        self.ledger
            .with_accrued(user, price, now, |account, accrual| {
                self.render_action(user, action, account, accrual, price)
            })
            .await
    }

    /// Handles free text, which is treated as a wallet address.
    pub async fn handle_text(&self, user: UserId, text: &str, now: DateTime<Utc>) -> Reply {
        let address = text.trim();

        match self.ledger.set_wallet(user, address, now).await {
            Ok(()) => Reply::menu(format!("✅ BTC wallet saved: {address}")),
            Err(_) => Reply::menu("⚠️ Invalid input. Tap buttons below."),
        }
    }

    fn render_action(
        &self,
        user: UserId,
        action: BotAction,
        account: &mut Account,
        accrual: Accrual,
        price: f64,
    ) -> Reply {
        match action {
            BotAction::Mine => Reply::menu(format!(
                "⛏ Mining runs automatically in background.\n\
                 💰 Earn ${EARN_USD_PER_INTERVAL:.2} every 2 minutes."
            )),
            BotAction::Balance => {
                let progress = Progress::from_elapsed(accrual.elapsed_secs);
                Reply::menu(format!(
                    "📊 Balance:\n{}\n💰 {} BTC (~${})\n⏱ Next credit in: {} sec",
                    progress.render(PROGRESS_FILLED, PROGRESS_EMPTY),
                    format_btc(account.balance),
                    format_usd(account.usd_value(price)),
                    progress.seconds_remaining,
                ))
            }
            BotAction::Withdraw => match account.withdraw_eligibility(price) {
                WithdrawEligibility::BelowMinimum { usd_value } => Reply::menu(format!(
                    "⚠️ Minimum withdrawal is ${MIN_WITHDRAW_USD:.0}.\nBalance: ${}",
                    format_usd(usd_value)
                )),
                WithdrawEligibility::NoWallet => {
                    Reply::menu("📥 No wallet found. Use Add Wallet first.")
                }
                WithdrawEligibility::Eligible { fee_btc } => Reply::confirm(format!(
                    "📤 To withdraw, first pay a ${WITHDRAW_FEE_USD:.0} fee ({} BTC) to:\n{}\n\
                     After payment, press confirm:",
                    format_btc(fee_btc),
                    self.settings.fee_address,
                )),
            },
            BotAction::ConfirmWithdraw => {
                let withdrawn = account.confirm_withdraw(price);
                info!("User {} confirmed withdrawal of {:.6} BTC", user, withdrawn);
                Reply::menu(format!(
                    "✅ Withdrawal successful!\nAmount sent: {} BTC\nWallet: {}\n\
                     💰 New balance: 0 BTC\n\n\
                     ⚠️ Make sure you paid ${WITHDRAW_FEE_USD:.0} fee first!",
                    format_btc(withdrawn),
                    account.wallet.as_deref().unwrap_or("not set"),
                ))
            }
            BotAction::AddWallet => Reply::menu("💳 Please send your BTC wallet address."),
            BotAction::About => Reply::menu(format!(
                "ℹ️ This is Telegram Bit Miner.\n\
                 💰 Earn ${EARN_USD_PER_INTERVAL:.2} every 2 minutes continuously.\n\
                 ⏳ You can mine for over a year!"
            )),
            BotAction::Referral => Reply::menu(format!(
                "👥 Invite friends and earn extra!\n\
                 💰 You'll earn ${REFERRAL_BONUS_USD:.2} for every user that uses your referral link.\n\n\
                 Here is your referral link:\n{}",
                self.settings.referral_link(user)
            )),
        }
    }
}

impl<O> std::fmt::Debug for ActionHandler<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Formats a BTC amount with six decimals.
fn format_btc(amount: f64) -> String {
    format!("{amount:.6}")
}

/// Formats a USD amount with two decimals.
fn format_usd(amount: f64) -> String {
    format!("{amount:.2}")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::commands::Keyboard;
    use crate::oracle::FixedPriceOracle;

    const PRICE: f64 = 50_000.0;
    const USER: UserId = 1001;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn handler() -> ActionHandler<FixedPriceOracle> {
        ActionHandler::new(
            Arc::new(Ledger::new()),
            Arc::new(FixedPriceOracle(PRICE)),
            Arc::new(BotSettings::new("1:test")),
        )
    }

    async fn seed(handler: &ActionHandler<FixedPriceOracle>, usd: f64, wallet: Option<&str>) {
        handler
            .ledger()
            .update(USER, t0(), |account| {
                account.balance = usd / PRICE;
                account.wallet = wallet.map(str::to_owned);
            })
            .await;
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_btc(0.000_01), "0.000010");
        assert_eq!(format_usd(499.994), "499.99");
    }

    #[tokio::test]
    async fn test_start_opens_account() {
        let handler = handler();
        let reply = handler.handle_start(USER, StartArgs::default(), t0()).await;

        assert!(reply.text.contains("Welcome"));
        assert_eq!(reply.keyboard, Keyboard::Main);
        assert_eq!(handler.ledger().len().await, 1);
    }

    #[tokio::test]
    async fn test_start_credits_referrer() {
        let handler = handler();
        handler
            .handle_start(USER, StartArgs::parse("2002", USER), t0())
            .await;

        let referrer = handler.ledger().get(2002).await.unwrap();
        assert!((referrer.balance - 0.10 / PRICE).abs() < 1e-15);
    }

    #[tokio::test]
    async fn test_repeated_referral_starts_credit_again() {
        let handler = handler();
        for _ in 0..3 {
            handler
                .handle_start(USER, StartArgs::parse("2002", USER), t0())
                .await;
        }

        let referrer = handler.ledger().get(2002).await.unwrap();
        assert!((referrer.balance - 0.30 / PRICE).abs() < 1e-15);
    }

    #[tokio::test]
    async fn test_self_referral_credits_nothing() {
        let handler = handler();
        handler
            .handle_start(USER, StartArgs::parse(&USER.to_string(), USER), t0())
            .await;

        let account = handler.ledger().get(USER).await.unwrap();
        assert_eq!(account.balance, 0.0);
        assert_eq!(handler.ledger().len().await, 1);
    }

    #[tokio::test]
    async fn test_balance_after_two_minutes() {
        let handler = handler();
        handler.handle_start(USER, StartArgs::default(), t0()).await;

        let reply = handler
            .handle_action(USER, BotAction::Balance, t0() + Duration::seconds(120))
            .await;
        assert!(reply.text.contains("0.000010 BTC (~$0.50)"), "{}", reply.text);
        assert!(reply.text.contains("Next credit in: 120 sec"));
    }

    #[tokio::test]
    async fn test_balance_progress_bar() {
        let handler = handler();
        handler.handle_start(USER, StartArgs::default(), t0()).await;

        let reply = handler
            .handle_action(USER, BotAction::Balance, t0() + Duration::seconds(60))
            .await;
        let bar = format!("{}{}", "🔺".repeat(5), "▫️".repeat(5));
        assert!(reply.text.contains(&bar));
        assert!(reply.text.contains("Next credit in: 60 sec"));
    }

    #[tokio::test]
    async fn test_every_action_accrues() {
        let handler = handler();
        handler.handle_start(USER, StartArgs::default(), t0()).await;

        handler
            .handle_action(USER, BotAction::About, t0() + Duration::seconds(240))
            .await;
        let account = handler.ledger().get(USER).await.unwrap();
        assert!((account.balance - 0.00002).abs() < 1e-12);
        assert_eq!(account.last_check, t0() + Duration::seconds(240));
    }

    #[tokio::test]
    async fn test_withdraw_below_threshold() {
        let handler = handler();
        seed(&handler, 499.99, Some("bc1qexample")).await;

        let reply = handler.handle_action(USER, BotAction::Withdraw, t0()).await;
        assert!(reply.text.contains("Minimum withdrawal is $500"));
        assert!(reply.text.contains("$499.99"));
        assert_eq!(reply.keyboard, Keyboard::Main);
    }

    #[tokio::test]
    async fn test_withdraw_needs_wallet_then_becomes_eligible() {
        let handler = handler();
        seed(&handler, 600.0, None).await;

        let reply = handler.handle_action(USER, BotAction::Withdraw, t0()).await;
        assert!(reply.text.contains("No wallet found"));

        let reply = handler
            .handle_text(USER, "  1BoatSLRHtKNngkdXEeobR76b53LETtpyT ", t0())
            .await;
        assert!(reply.text.contains("wallet saved: 1BoatSLRHtKNngkdXEeobR76b53LETtpyT"));

        let reply = handler.handle_action(USER, BotAction::Withdraw, t0()).await;
        assert_eq!(reply.keyboard, Keyboard::ConfirmWithdraw);
        assert!(reply.text.contains("0.002000 BTC"));
        assert!(reply.text.contains(crate::config::DEFAULT_FEE_ADDRESS));
    }

    #[tokio::test]
    async fn test_confirm_withdraw_pays_out_and_zeroes() {
        let handler = handler();
        handler
            .ledger()
            .update(USER, t0(), |account| {
                account.balance = 0.02;
                account.wallet = Some("bc1qpayout".to_owned());
            })
            .await;

        let reply = handler
            .handle_action(USER, BotAction::ConfirmWithdraw, t0())
            .await;
        assert!(reply.text.contains("Amount sent: 0.018000 BTC"));
        assert!(reply.text.contains("Wallet: bc1qpayout"));
        assert_eq!(handler.ledger().get(USER).await.unwrap().balance, 0.0);
    }

    #[tokio::test]
    async fn test_confirm_withdraw_is_unconditional() {
        let handler = handler();
        seed(&handler, 10.0, None).await;

        let reply = handler
            .handle_action(USER, BotAction::ConfirmWithdraw, t0())
            .await;
        assert!(reply.text.contains("Amount sent: 0.000000 BTC"));
        assert_eq!(handler.ledger().get(USER).await.unwrap().balance, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_wallet_text() {
        let handler = handler();
        seed(&handler, 0.0, Some("3existing")).await;

        let reply = handler.handle_text(USER, "hello there", t0()).await;
        assert!(reply.text.contains("Invalid input"));
        assert_eq!(
            handler.ledger().get(USER).await.unwrap().wallet.as_deref(),
            Some("3existing")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_actions_credit_once() {
        let handler = Arc::new(handler());
        handler.handle_start(USER, StartArgs::default(), t0()).await;

        let actions = [BotAction::Balance, BotAction::Mine, BotAction::About];
        let handles: Vec<_> = (0..48_i64)
            .map(|i| {
                let handler = Arc::clone(&handler);
                let action = actions[usize::try_from(i).unwrap() % actions.len()];
                let now = t0() + Duration::seconds(if i % 2 == 0 { 240 } else { 120 + i });
                tokio::spawn(async move { handler.handle_action(USER, action, now).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let account = handler.ledger().get(USER).await.unwrap();
        assert!((account.balance - 0.00002).abs() < 1e-12, "{}", account.balance);
        assert_eq!(account.last_check, t0() + Duration::seconds(240));
    }

    #[tokio::test]
    async fn test_referral_link() {
        let handler = handler();
        let reply = handler.handle_action(USER, BotAction::Referral, t0()).await;
        assert!(reply.text.contains("https://t.me/TLbitminerbot?start=1001"));
        assert!(reply.text.contains("$0.10"));
    }
}
