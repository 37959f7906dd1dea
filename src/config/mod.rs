//! Configuration module for the mining bot.
//!
//! Loads the bot token, transport selection, reply texts and price quote
//! settings from the process environment.

mod settings;

pub use settings::{BotSettings, ConfigError, OracleSettings, TransportMode, mask_token};

/// Default quote endpoint (CoinGecko simple price, BTC in USD).
pub const DEFAULT_QUOTE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Default bot username used in referral links.
pub const DEFAULT_BOT_USERNAME: &str = "TLbitminerbot";

/// Default address shown in the withdrawal fee prompt.
pub const DEFAULT_FEE_ADDRESS: &str = "bc1qrucwx02e0m8v4smp44ferp93ynvsaw277t088f";
