//! HTTP quote service client with caching and fallback.

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::PriceOracle;
use crate::config::OracleSettings;

/// Errors raised while fetching a quote.
///
/// These never leave [`QuoteOracle::current_price`]; they are logged and
/// replaced by the fallback price.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed quote response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Quote is not a positive price: {0}")]
    InvalidPrice(f64),
}

/// What to return when the quote service fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackPolicy {
    /// Always substitute the given price.
    Fixed(f64),

    /// Reuse the last successful quote, or the given price if there is none.
    LastKnownOr(f64),
}

impl FallbackPolicy {
    /// Resolves the fallback price given the last successful quote.
    #[must_use]
    pub fn resolve(self, last_known: Option<f64>) -> f64 {
        match self {
            Self::Fixed(price) => price,
            Self::LastKnownOr(price) => last_known.unwrap_or(price),
        }
    }

    /// Builds a policy from its configuration name and fixed price.
    ///
    /// Unknown names yield `None`.
    #[must_use]
    pub fn from_name(name: &str, price: f64) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "fixed" => Some(Self::Fixed(price)),
            "last_known" | "last-known" => Some(Self::LastKnownOr(price)),
            _ => None,
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = String;

    /// Parses `fixed` or `last_known` with the default fallback price.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, super::DEFAULT_FALLBACK_PRICE)
            .ok_or_else(|| format!("unknown fallback policy: {s}"))
    }
}

/// `{"bitcoin": {"usd": 43000.0}}`
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: CoinQuote,
}

#[derive(Debug, Deserialize)]
struct CoinQuote {
    usd: f64,
}

/// Extracts the BTC/USD price from a quote service response body.
pub fn parse_quote(body: &str) -> Result<f64, QuoteError> {
    let response: SimplePriceResponse = serde_json::from_str(body)?;
    let price = response.bitcoin.usd;

    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(QuoteError::InvalidPrice(price))
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedQuote {
    price: f64,
    fetched_at: Instant,
}

impl CachedQuote {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !ttl.is_zero() && self.fetched_at.elapsed() < ttl
    }
}

/// Oracle backed by an HTTP quote endpoint.
pub struct QuoteOracle {
    client: reqwest::Client,
    url: String,
    cache_ttl: Duration,
    fallback: FallbackPolicy,
    last_quote: Mutex<Option<CachedQuote>>,
}

impl QuoteOracle {
    /// Creates an oracle from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &OracleSettings) -> Result<Self, QuoteError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            cache_ttl: settings.cache_ttl,
            fallback: settings.fallback,
            last_quote: Mutex::new(None),
        })
    }

    /// Queries the quote service once, bypassing cache and fallback.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, timeout, non-success status,
    /// or a body without a positive price.
    pub async fn fetch(&self) -> Result<f64, QuoteError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_quote(&body)
    }
}

impl PriceOracle for QuoteOracle {
    async fn current_price(&self) -> f64 {
        let last = *self.last_quote.lock().await;

        if let Some(cached) = last
            && cached.is_fresh(self.cache_ttl)
        {
            debug!("Using cached BTC price {:.2}", cached.price);
            return cached.price;
        }

        match self.fetch().await {
            Ok(price) => {
                debug!("Fetched BTC price {:.2}", price);
                *self.last_quote.lock().await = Some(CachedQuote {
                    price,
                    fetched_at: Instant::now(),
                });
                price
            }
            Err(e) => {
                let price = self.fallback.resolve(last.map(|q| q.price));
                warn!("Price quote failed ({}), using fallback {:.2}", e, price);
                price
            }
        }
    }
}

impl std::fmt::Debug for QuoteOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteOracle")
            .field("url", &self.url)
            .field("cache_ttl", &self.cache_ttl)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_settings(fallback: FallbackPolicy) -> OracleSettings {
        OracleSettings {
            // Port 9 (discard) is closed on test machines, so the connect fails fast.
            url: "http://127.0.0.1:9/simple/price".to_owned(),
            timeout: Duration::from_secs(1),
            cache_ttl: Duration::ZERO,
            fallback,
        }
    }

    #[test]
    fn test_parse_quote() {
        let body = r#"{"bitcoin":{"usd":43210.5}}"#;
        assert_eq!(parse_quote(body).unwrap(), 43210.5);
    }

    #[test]
    fn test_parse_quote_integer_price() {
        assert_eq!(parse_quote(r#"{"bitcoin":{"usd":50000}}"#).unwrap(), 50000.0);
    }

    #[test]
    fn test_parse_quote_malformed() {
        assert!(matches!(parse_quote("not json"), Err(QuoteError::Decode(_))));
        assert!(matches!(
            parse_quote(r#"{"ethereum":{"usd":3000}}"#),
            Err(QuoteError::Decode(_))
        ));
        assert!(matches!(
            parse_quote(r#"{"bitcoin":{"usd":"50000"}}"#),
            Err(QuoteError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_quote_rejects_non_positive() {
        assert!(matches!(
            parse_quote(r#"{"bitcoin":{"usd":0}}"#),
            Err(QuoteError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_quote(r#"{"bitcoin":{"usd":-5.0}}"#),
            Err(QuoteError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_fallback_policy_resolve() {
        assert_eq!(FallbackPolicy::Fixed(30_000.0).resolve(Some(45_000.0)), 30_000.0);
        assert_eq!(FallbackPolicy::LastKnownOr(30_000.0).resolve(Some(45_000.0)), 45_000.0);
        assert_eq!(FallbackPolicy::LastKnownOr(30_000.0).resolve(None), 30_000.0);
    }

    #[test]
    fn test_fallback_policy_from_name() {
        assert_eq!(
            FallbackPolicy::from_name("fixed", 1.0),
            Some(FallbackPolicy::Fixed(1.0))
        );
        assert_eq!(
            FallbackPolicy::from_name(" Last_Known ", 2.0),
            Some(FallbackPolicy::LastKnownOr(2.0))
        );
        assert_eq!(FallbackPolicy::from_name("random", 1.0), None);
        assert_eq!(
            "last-known".parse::<FallbackPolicy>(),
            Ok(FallbackPolicy::LastKnownOr(30_000.0))
        );
    }

    #[test]
    fn test_cached_quote_freshness() {
        let quote = CachedQuote {
            price: 1.0,
            fetched_at: Instant::now(),
        };
        assert!(quote.is_fresh(Duration::from_secs(60)));
        assert!(!quote.is_fresh(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_unreachable_service_uses_fallback() {
        let oracle = QuoteOracle::new(&unreachable_settings(FallbackPolicy::Fixed(30_000.0))).unwrap();
        assert!(oracle.fetch().await.is_err());
        assert_eq!(oracle.current_price().await, 30_000.0);
    }

    #[tokio::test]
    async fn test_last_known_quote_survives_failure() {
        let oracle =
            QuoteOracle::new(&unreachable_settings(FallbackPolicy::LastKnownOr(30_000.0))).unwrap();
        *oracle.last_quote.lock().await = Some(CachedQuote {
            price: 61_000.0,
            fetched_at: Instant::now(),
        });

        assert_eq!(oracle.current_price().await, 61_000.0);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let mut settings = unreachable_settings(FallbackPolicy::Fixed(30_000.0));
        settings.cache_ttl = Duration::from_secs(300);
        let oracle = QuoteOracle::new(&settings).unwrap();
        *oracle.last_quote.lock().await = Some(CachedQuote {
            price: 52_000.0,
            fetched_at: Instant::now(),
        });

        assert_eq!(oracle.current_price().await, 52_000.0);
    }
}
