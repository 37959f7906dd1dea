//! Application settings loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use super::{DEFAULT_BOT_USERNAME, DEFAULT_FEE_ADDRESS, DEFAULT_QUOTE_URL};
use crate::oracle::{DEFAULT_FALLBACK_PRICE, FallbackPolicy};

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportMode {
    /// Long polling via `getUpdates`.
    #[default]
    Polling,

    /// Telegram pushes updates to an HTTP listener.
    Webhook,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polling" | "poll" => Ok(Self::Polling),
            "webhook" | "hook" => Ok(Self::Webhook),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Quote service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    /// Quote endpoint returning `{"bitcoin": {"usd": <price>}}`.
    pub url: String,

    /// Upper bound on a single quote request.
    pub timeout: Duration,

    /// How long a quote is reused. Zero refetches on every call.
    pub cache_ttl: Duration,

    /// Price substituted when the quote fails.
    pub fallback: FallbackPolicy,
}

fn default_quote_timeout() -> Duration {
    Duration::from_secs(8)
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_QUOTE_URL.to_owned(),
            timeout: default_quote_timeout(),
            cache_ttl: Duration::ZERO,
            fallback: FallbackPolicy::Fixed(DEFAULT_FALLBACK_PRICE),
        }
    }
}

/// Bot settings.
#[derive(Clone)]
pub struct BotSettings {
    /// Bot API token.
    pub token: String,

    /// Update transport.
    pub transport: TransportMode,

    /// Port the webhook listener binds on `0.0.0.0`.
    pub port: u16,

    /// Public base URL the webhook is registered under.
    pub webhook_base_url: Option<String>,

    /// Bot username used to build referral links.
    pub bot_username: String,

    /// Address shown in the withdrawal fee prompt.
    pub fee_address: String,

    /// Price quote settings.
    pub oracle: OracleSettings,
}

fn default_port() -> u16 {
    5000
}

impl BotSettings {
    /// Creates settings with defaults for everything but the token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            transport: TransportMode::default(),
            port: default_port(),
            webhook_base_url: None,
            bot_username: DEFAULT_BOT_USERNAME.to_owned(),
            fee_address: DEFAULT_FEE_ADDRESS.to_owned(),
            oracle: OracleSettings::default(),
        }
    }

    /// Creates settings from environment variables.
    ///
    /// `BOT_TOKEN` is required; everything else falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `BOT_TOKEN` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates settings from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Unparseable optional values use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("BOT_TOKEN").ok_or(ConfigError::MissingEnvVar("BOT_TOKEN"))?;
        let mut settings = Self::new(token.trim());

        if let Some(mode) = get("BOT_TRANSPORT").and_then(|s| s.parse().ok()) {
            settings.transport = mode;
        }
        if let Some(port) = get("PORT").and_then(|s| s.trim().parse().ok()) {
            settings.port = port;
        }
        settings.webhook_base_url = get("WEBHOOK_BASE_URL");
        if let Some(username) = get("BOT_USERNAME") {
            settings.bot_username = username.trim().trim_start_matches('@').to_owned();
        }
        if let Some(address) = get("FEE_ADDRESS") {
            settings.fee_address = address.trim().to_owned();
        }

        let oracle = &mut settings.oracle;
        if let Some(url) = get("QUOTE_URL") {
            oracle.url = url;
        }
        if let Some(secs) = get("QUOTE_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            oracle.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get("QUOTE_CACHE_TTL_SECS").and_then(|s| s.trim().parse().ok()) {
            oracle.cache_ttl = Duration::from_secs(secs);
        }
        let fallback_price = get("QUOTE_FALLBACK_PRICE")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(DEFAULT_FALLBACK_PRICE);
        oracle.fallback = get("QUOTE_FALLBACK_POLICY")
            .and_then(|name| FallbackPolicy::from_name(&name, fallback_price))
            .unwrap_or(FallbackPolicy::Fixed(fallback_price));

        Ok(settings)
    }

    /// Overrides the transport.
    #[must_use]
    pub const fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    /// Full webhook URL: the base URL with the token as its path.
    ///
    /// # Errors
    ///
    /// Returns an error if no webhook base URL is configured.
    pub fn webhook_url(&self) -> Result<String, ConfigError> {
        let base = self
            .webhook_base_url
            .as_deref()
            .ok_or(ConfigError::MissingEnvVar("WEBHOOK_BASE_URL"))?;
        Ok(format!("{}/{}", base.trim().trim_end_matches('/'), self.token))
    }

    /// Deep link that starts the bot with `user_id` as the referrer.
    #[must_use]
    pub fn referral_link(&self, user_id: u64) -> String {
        format!("https://t.me/{}?start={user_id}", self.bot_username)
    }
}

impl std::fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotSettings")
            .field("token", &mask_token(&self.token))
            .field("transport", &self.transport)
            .field("port", &self.port)
            .field("webhook_base_url", &self.webhook_base_url)
            .field("bot_username", &self.bot_username)
            .field("fee_address", &self.fee_address)
            .field("oracle", &self.oracle)
            .finish()
    }
}

/// Masks a bot token for logging (keeps the numeric bot id).
#[must_use]
pub fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:****"),
        None => "****".to_owned(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
}
