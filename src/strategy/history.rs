//! Rolling price history and indicators
//!
//! Per-token timestamped price samples trimmed to a 24h window, plus the
//! indicator bundle the mean-reversion scorer runs on: SMA, population
//! standard deviation, z-score, Wilder RSI, deviation from mean, and
//! drawdown from the recent high.

use std::collections::{HashMap, VecDeque};

/// Rolling window length in seconds
pub const HISTORY_WINDOW_SECS: u64 = 24 * 3600;

/// Minimum samples before indicators activate
pub const MIN_SAMPLES_FOR_INDICATORS: usize = 20;

/// Maximum RSI period (fewer deltas are used while warming up)
pub const RSI_MAX_PERIOD: usize = 14;

/// Samples considered for the drop-from-high calculation
pub const DROP_LOOKBACK_SAMPLES: usize = 48;

/// A single timestamped price sample
#[derive(Debug, Clone, Copy)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: u64,
}

/// Indicator bundle computed from a token's trimmed history
#[derive(Debug, Clone, Copy)]
pub struct Indicators {
    pub sma: f64,
    pub std_dev: f64,
    /// Standard deviations the current price sits from the SMA (0 when
    /// the window has no variance)
    pub z_score: f64,
    pub rsi: f64,
    /// Percent deviation of the current price from the SMA
    pub deviation_pct: f64,
    /// Percent drop from the max of the last `DROP_LOOKBACK_SAMPLES`
    /// samples (negative when below the high)
    pub drop_from_high_pct: f64,
}

/// Rolling per-token price history
#[derive(Debug, Default)]
pub struct PriceHistory {
    series: HashMap<String, VecDeque<PricePoint>>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and trim the token's window to the last 24h.
    pub fn record(&mut self, mint: &str, price: f64, now: u64) {
        let points = self.series.entry(mint.to_string()).or_default();
        points.push_back(PricePoint {
            price,
            timestamp: now,
        });
        let cutoff = now.saturating_sub(HISTORY_WINDOW_SECS);
        while points.front().map_or(false, |p| p.timestamp < cutoff) {
            points.pop_front();
        }
    }

    /// Number of samples currently held for a mint.
    pub fn sample_count(&self, mint: &str) -> usize {
        self.series.get(mint).map_or(0, |p| p.len())
    }

    /// Compute the indicator bundle for a mint, or `None` until the
    /// minimum sample count is reached.
    pub fn indicators(&self, mint: &str, current_price: f64) -> Option<Indicators> {
        let points = self.series.get(mint)?;
        if points.len() < MIN_SAMPLES_FOR_INDICATORS {
            return None;
        }

        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let n = prices.len() as f64;

        let sma = prices.iter().sum::<f64>() / n;
        let variance = prices.iter().map(|p| (p - sma).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let z_score = if std_dev > 0.0 {
            (current_price - sma) / std_dev
        } else {
            0.0
        };

        let deviation_pct = if sma > 0.0 {
            (current_price - sma) / sma * 100.0
        } else {
            0.0
        };

        let recent_high = prices
            .iter()
            .rev()
            .take(DROP_LOOKBACK_SAMPLES)
            .fold(f64::MIN, |acc, p| acc.max(*p));
        let drop_from_high_pct = if recent_high > 0.0 {
            (current_price - recent_high) / recent_high * 100.0
        } else {
            0.0
        };

        Some(Indicators {
            sma,
            std_dev,
            z_score,
            rsi: wilder_rsi(&prices),
            deviation_pct,
            drop_from_high_pct,
        })
    }
}

/// RSI over the last `min(14, n-1)` deltas using Wilder's gain/loss
/// averaging. RS is capped at 100 when no losses occurred in the window.
fn wilder_rsi(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 50.0;
    }
    let period = RSI_MAX_PERIOD.min(prices.len() - 1);
    let deltas: Vec<f64> = prices[prices.len() - period - 1..]
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    let avg_gain = deltas.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let avg_loss = deltas.iter().filter(|d| **d < 0.0).sum::<f64>().abs() / period as f64;

    let rs = if avg_loss > 0.0 { avg_gain / avg_loss } else { 100.0 };
    100.0 - 100.0 / (1.0 + rs)
}
