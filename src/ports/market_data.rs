//! Market data port
//!
//! Trait abstraction over the external market-data provider: candidate
//! discovery, single-token price lookup, and reference price series for
//! the trend filter. Implementations live in the adapters layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// 24h transaction counts for a token pair
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TxnCounts {
    pub buys: u64,
    pub sells: u64,
}

impl TxnCounts {
    /// Fraction of transactions that were buys. Neutral (0.5) when no
    /// transactions have been observed.
    pub fn buy_ratio(&self) -> f64 {
        let total = self.buys + self.sells;
        if total == 0 {
            return 0.5;
        }
        self.buys as f64 / total as f64
    }
}

/// A token candidate as returned by discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Token symbol (e.g. "BONK")
    pub token: String,
    /// Token mint address
    pub mint: String,
    /// Current price in USDC
    pub price: f64,
    /// Pool liquidity in USD
    pub liquidity_usd: f64,
    /// Trailing volumes in USD
    pub volume_24h: f64,
    pub volume_6h: f64,
    pub volume_1h: f64,
    /// Trailing price changes in percent
    pub price_change_24h: f64,
    pub price_change_6h: f64,
    pub price_change_1h: f64,
    /// 24h buy/sell transaction counts
    pub txns_24h: TxnCounts,
}

/// Slim quote for re-pricing an open position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub liquidity_usd: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
}

/// Market data port trait
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch the current candidate set. An empty result means "nothing to
    /// do" for this cycle, never a failure.
    async fn discover_candidates(&self) -> Result<Vec<TokenSnapshot>, MarketDataError>;

    /// Look up the current price for a single mint. `Ok(None)` means the
    /// token was not found and should be skipped this cycle.
    async fn lookup_price(&self, mint: &str) -> Result<Option<PriceQuote>, MarketDataError>;

    /// Fetch a multi-day price series for the reference asset, oldest
    /// first. Providers without a candle API return
    /// [`MarketDataError::Unsupported`] and the caller falls back to a
    /// reconstructed series.
    async fn reference_series(&self, mint: &str, days: u32) -> Result<Vec<f64>, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_ratio() {
        let txns = TxnCounts { buys: 60, sells: 40 };
        assert!((txns.buy_ratio() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_buy_ratio_no_txns_is_neutral() {
        let txns = TxnCounts::default();
        assert_eq!(txns.buy_ratio(), 0.5);
    }
}
