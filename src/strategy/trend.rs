//! Trend filter
//!
//! Classifies the overall market regime from the reference asset's price
//! series: deviation of the current price from the series mean, with a
//! +/-3% band around neutral. Results are cached for a short TTL to
//! bound collaborator calls, and any fetch failure degrades to neutral.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ports::market_data::MarketDataPort;

/// Cache TTL for the classified regime
pub const DEFAULT_REGIME_TTL_SECS: u64 = 300;

/// Deviation band (percent) separating trending from neutral
pub const DEFAULT_DEVIATION_THRESHOLD_PCT: f64 = 3.0;

/// Days of reference history requested from the provider
pub const REFERENCE_SERIES_DAYS: u32 = 7;

/// Points used when reconstructing a synthetic series
const SYNTHETIC_SERIES_POINTS: usize = 24;

/// Coarse market-direction label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Uptrend,
    Downtrend,
    Neutral,
}

impl Regime {
    /// Mean-reversion longs are only taken outside a downtrend.
    pub fn allows_mean_reversion_long(&self) -> bool {
        !matches!(self, Regime::Downtrend)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Uptrend => write!(f, "uptrend"),
            Regime::Downtrend => write!(f, "downtrend"),
            Regime::Neutral => write!(f, "neutral"),
        }
    }
}

/// Trend filter configuration
#[derive(Debug, Clone)]
pub struct TrendConfig {
    /// Mint of the reference asset (e.g. wrapped SOL)
    pub reference_mint: String,
    pub ttl: Duration,
    pub deviation_threshold_pct: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            reference_mint: "So11111111111111111111111111111111111111112".to_string(),
            ttl: Duration::from_secs(DEFAULT_REGIME_TTL_SECS),
            deviation_threshold_pct: DEFAULT_DEVIATION_THRESHOLD_PCT,
        }
    }
}

/// Regime classifier with TTL cache over the market-data port
pub struct TrendFilter {
    config: TrendConfig,
    market: Arc<dyn MarketDataPort>,
    cached: Mutex<Option<(Regime, Instant)>>,
}

impl TrendFilter {
    pub fn new(config: TrendConfig, market: Arc<dyn MarketDataPort>) -> Self {
        Self {
            config,
            market,
            cached: Mutex::new(None),
        }
    }

    /// Current regime, from cache when fresh. Never fails: any
    /// collaborator error degrades to [`Regime::Neutral`].
    pub async fn regime(&self) -> Regime {
        let mut cached = self.cached.lock().await;
        if let Some((regime, at)) = *cached {
            if at.elapsed() < self.config.ttl {
                return regime;
            }
        }

        let regime = self.fetch_and_classify().await;
        *cached = Some((regime, Instant::now()));
        debug!("market regime: {}", regime);
        regime
    }

    async fn fetch_and_classify(&self) -> Regime {
        let mint = &self.config.reference_mint;
        match self
            .market
            .reference_series(mint, REFERENCE_SERIES_DAYS)
            .await
        {
            Ok(series) if series.len() >= 2 => return self.classify(&series),
            Ok(_) => warn!("reference series too short, trying reconstruction"),
            Err(e) => debug!("reference series unavailable ({}), trying reconstruction", e),
        }

        // Fallback: reconstruct from the 24h percentage change. This is a
        // monotonic interpolation, not sampled data, and is never fed to
        // the signal-engine indicators.
        match self.market.lookup_price(mint).await {
            Ok(Some(quote)) => {
                let series = reconstruct_series(quote.price, quote.price_change_24h);
                self.classify(&series)
            }
            Ok(None) => {
                warn!("reference asset not found, defaulting to neutral regime");
                Regime::Neutral
            }
            Err(e) => {
                warn!("trend fetch failed ({}), defaulting to neutral regime", e);
                Regime::Neutral
            }
        }
    }

    fn classify(&self, series: &[f64]) -> Regime {
        let sma = series.iter().sum::<f64>() / series.len() as f64;
        if sma <= 0.0 {
            return Regime::Neutral;
        }
        let current = *series.last().unwrap_or(&sma);
        let deviation_pct = (current - sma) / sma * 100.0;

        if deviation_pct > self.config.deviation_threshold_pct {
            Regime::Uptrend
        } else if deviation_pct < -self.config.deviation_threshold_pct {
            Regime::Downtrend
        } else {
            Regime::Neutral
        }
    }
}

/// Linear interpolation from the implied price 24h ago to the current
/// price. An approximation for providers without a candle API.
pub fn reconstruct_series(current_price: f64, change_24h_pct: f64) -> Vec<f64> {
    let start = current_price / (1.0 + change_24h_pct / 100.0);
    (0..SYNTHETIC_SERIES_POINTS)
        .map(|i| {
            let t = i as f64 / (SYNTHETIC_SERIES_POINTS - 1) as f64;
            start + (current_price - start) * t
        })
        .collect()
}
