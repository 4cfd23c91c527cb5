//! DexScreener market data adapter
//!
//! Read-only HTTP client over the public DexScreener API implementing
//! [`MarketDataPort`]. Discovery runs the configured search queries and
//! flattens the pair results into one snapshot per base token, keeping
//! the deepest pool when a token trades in several. DexScreener has no
//! historical candle endpoint, so `reference_series` is unsupported and
//! the trend filter falls back to its synthetic series.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ports::{MarketDataError, MarketDataPort, PriceQuote, TokenSnapshot, TxnCounts};

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// DexScreener REST client
pub struct DexScreenerClient {
    http: reqwest::Client,
    base_url: String,
    search_queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pairs: Vec<Pair>,
}

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    pairs: Vec<Pair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    base_token: BaseToken,
    /// DexScreener serves the price as a decimal string
    price_usd: Option<String>,
    liquidity: Option<Liquidity>,
    #[serde(default)]
    volume: Windows,
    #[serde(default)]
    price_change: Windows,
    txns: Option<Txns>,
}

#[derive(Debug, Deserialize)]
struct BaseToken {
    address: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Windows {
    h24: Option<f64>,
    h6: Option<f64>,
    h1: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Txns {
    h24: Option<TxnWindow>,
}

#[derive(Debug, Deserialize)]
struct TxnWindow {
    buys: Option<u64>,
    sells: Option<u64>,
}

impl Pair {
    fn into_snapshot(self) -> Option<TokenSnapshot> {
        let price: f64 = self.price_usd?.parse().ok()?;
        if price <= 0.0 {
            return None;
        }
        let txns = self
            .txns
            .and_then(|t| t.h24)
            .map(|w| TxnCounts {
                buys: w.buys.unwrap_or(0),
                sells: w.sells.unwrap_or(0),
            })
            .unwrap_or(TxnCounts { buys: 0, sells: 0 });
        Some(TokenSnapshot {
            token: self.base_token.symbol,
            mint: self.base_token.address,
            price,
            liquidity_usd: self.liquidity.and_then(|l| l.usd).unwrap_or(0.0),
            volume_24h: self.volume.h24.unwrap_or(0.0),
            volume_6h: self.volume.h6.unwrap_or(0.0),
            volume_1h: self.volume.h1.unwrap_or(0.0),
            price_change_24h: self.price_change.h24.unwrap_or(0.0),
            price_change_6h: self.price_change.h6.unwrap_or(0.0),
            price_change_1h: self.price_change.h1.unwrap_or(0.0),
            txns_24h: txns,
        })
    }
}

impl DexScreenerClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        search_queries: Vec<String>,
    ) -> Result<Self, MarketDataError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            search_queries,
        })
    }

    pub fn default_client(search_queries: Vec<String>) -> Result<Self, MarketDataError> {
        Self::new(
            DEFAULT_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search_queries,
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(MarketDataError::Http(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MarketDataPort for DexScreenerClient {
    async fn discover_candidates(&self) -> Result<Vec<TokenSnapshot>, MarketDataError> {
        let mut best: std::collections::HashMap<String, TokenSnapshot> =
            std::collections::HashMap::new();

        for query in &self.search_queries {
            let path = format!("/latest/dex/search?q={}", query);
            let response: SearchResponse = match self.get_json(&path).await {
                Ok(r) => r,
                Err(e @ MarketDataError::RateLimited(_)) => return Err(e),
                Err(e) => {
                    // One bad query must not sink the whole scan
                    warn!("discovery query '{}' failed: {}", query, e);
                    continue;
                }
            };
            for pair in response.pairs {
                let Some(snapshot) = pair.into_snapshot() else {
                    continue;
                };
                match best.get(&snapshot.mint) {
                    Some(existing) if existing.liquidity_usd >= snapshot.liquidity_usd => {}
                    _ => {
                        best.insert(snapshot.mint.clone(), snapshot);
                    }
                }
            }
        }

        debug!("discovery found {} unique tokens", best.len());
        Ok(best.into_values().collect())
    }

    async fn lookup_price(&self, mint: &str) -> Result<Option<PriceQuote>, MarketDataError> {
        let path = format!("/latest/dex/tokens/{}", mint);
        let response: TokensResponse = self.get_json(&path).await?;

        // Deepest pool is the reference price
        let quote = response
            .pairs
            .into_iter()
            .filter_map(|p| p.into_snapshot())
            .filter(|s| s.mint == mint)
            .max_by(|a, b| {
                a.liquidity_usd
                    .partial_cmp(&b.liquidity_usd)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|s| PriceQuote {
                price: s.price,
                liquidity_usd: s.liquidity_usd,
                volume_24h: s.volume_24h,
                price_change_24h: s.price_change_24h,
            });
        Ok(quote)
    }

    async fn reference_series(&self, mint: &str, _days: u32) -> Result<Vec<f64>, MarketDataError> {
        Err(MarketDataError::Unsupported(format!(
            "no candle endpoint for {}",
            mint
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_json(address: &str, symbol: &str, price: &str, liq: f64) -> serde_json::Value {
        serde_json::json!({
            "baseToken": {"address": address, "symbol": symbol},
            "priceUsd": price,
            "liquidity": {"usd": liq},
            "volume": {"h24": 1_000_000.0, "h6": 250_000.0, "h1": 40_000.0},
            "priceChange": {"h24": -6.5, "h6": -2.0, "h1": 0.5},
            "txns": {"h24": {"buys": 120, "sells": 80}}
        })
    }

    #[test]
    fn test_pair_maps_to_snapshot() {
        let pair: Pair = serde_json::from_value(pair_json("mint1", "BONK", "0.000021", 3e6)).unwrap();
        let snap = pair.into_snapshot().unwrap();
        assert_eq!(snap.mint, "mint1");
        assert_eq!(snap.token, "BONK");
        assert!((snap.price - 0.000021).abs() < 1e-12);
        assert!((snap.liquidity_usd - 3e6).abs() < 1e-6);
        assert!((snap.price_change_24h + 6.5).abs() < 1e-12);
        assert_eq!(snap.txns_24h.buys, 120);
    }

    #[test]
    fn test_pair_without_price_is_dropped() {
        let mut value = pair_json("mint1", "BONK", "0.1", 3e6);
        value.as_object_mut().unwrap().remove("priceUsd");
        let pair: Pair = serde_json::from_value(value).unwrap();
        assert!(pair.into_snapshot().is_none());
    }

    #[test]
    fn test_pair_with_garbage_price_is_dropped() {
        let pair: Pair =
            serde_json::from_value(pair_json("mint1", "BONK", "not-a-number", 3e6)).unwrap();
        assert!(pair.into_snapshot().is_none());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let value = serde_json::json!({
            "baseToken": {"address": "mint1", "symbol": "X"},
            "priceUsd": "1.0"
        });
        let pair: Pair = serde_json::from_value(value).unwrap();
        let snap = pair.into_snapshot().unwrap();
        assert_eq!(snap.liquidity_usd, 0.0);
        assert_eq!(snap.volume_24h, 0.0);
        assert_eq!(snap.txns_24h.buys, 0);
        assert!((snap.txns_24h.buy_ratio() - 0.5).abs() < 1e-12);
    }
}
