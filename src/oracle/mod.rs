//! BTC/USD price oracle.
//!
//! Callers never see a quote failure: every oracle resolves to a positive
//! price, substituting a fallback when the quote service misbehaves.

mod quote;

use std::future::Future;

pub use quote::{FallbackPolicy, QuoteError, QuoteOracle, parse_quote};

/// Default BTC/USD price used when no quote can be obtained.
pub const DEFAULT_FALLBACK_PRICE: f64 = 30_000.0;

/// Source of BTC/USD prices.
pub trait PriceOracle: Send + Sync {
    /// Returns the current BTC price in USD. Always positive.
    fn current_price(&self) -> impl Future<Output = f64> + Send;
}

/// Oracle that always returns the same price.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPriceOracle(pub f64);

#[cfg(test)]
impl PriceOracle for FixedPriceOracle {
    async fn current_price(&self) -> f64 {
        self.0
    }
}
