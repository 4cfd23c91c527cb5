//! Signal engine
//!
//! Runs both scorers over the candidate set, records price history for
//! every candidate (feeding the indicators regardless of outcome), keeps
//! qualifying scores, and deduplicates per token keeping the strongest
//! strategy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::history::PriceHistory;
use super::mean_reversion::score_mean_reversion;
use super::momentum::score_momentum;
use crate::ports::market_data::TokenSnapshot;

/// Default minimum score for a signal to qualify
pub const DEFAULT_MIN_SIGNAL_SCORE: f64 = 35.0;

/// Default volume-spike multiplier for the momentum scorer
pub const DEFAULT_SPIKE_MULTIPLIER: f64 = 3.0;

/// Which strategy produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Momentum,
    MeanReversion,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Momentum => write!(f, "momentum"),
            Strategy::MeanReversion => write!(f, "meanReversion"),
        }
    }
}

/// A scored entry candidate, produced fresh each scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub token: String,
    pub mint: String,
    pub price: f64,
    /// 0..100
    pub score: f64,
    pub strategy: Strategy,
    pub reasons: Vec<String>,
}

/// Signal engine configuration
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub min_score: f64,
    pub spike_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SIGNAL_SCORE,
            spike_multiplier: DEFAULT_SPIKE_MULTIPLIER,
        }
    }
}

/// Scores candidates under both strategies with rolling history state
#[derive(Debug)]
pub struct SignalEngine {
    config: SignalConfig,
    history: PriceHistory,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            history: PriceHistory::new(),
        }
    }

    /// Score the candidate set. Output is ordered by score descending
    /// with at most one signal per mint (the higher-scoring strategy
    /// wins a tie between the two).
    pub fn detect_signals(&mut self, candidates: &[TokenSnapshot], now: u64) -> Vec<Signal> {
        // History is fed for every candidate, qualifying or not
        for snap in candidates {
            self.history.record(&snap.mint, snap.price, now);
        }

        let mut signals = Vec::new();
        for snap in candidates {
            let (momentum_score, momentum_reasons) =
                score_momentum(snap, self.config.spike_multiplier);
            if momentum_score >= self.config.min_score {
                signals.push(Signal {
                    token: snap.token.clone(),
                    mint: snap.mint.clone(),
                    price: snap.price,
                    score: momentum_score,
                    strategy: Strategy::Momentum,
                    reasons: momentum_reasons,
                });
            }

            let indicators = self.history.indicators(&snap.mint, snap.price);
            let (mr_score, mr_reasons) = score_mean_reversion(snap, indicators.as_ref());
            if mr_score >= self.config.min_score {
                signals.push(Signal {
                    token: snap.token.clone(),
                    mint: snap.mint.clone(),
                    price: snap.price,
                    score: mr_score,
                    strategy: Strategy::MeanReversion,
                    reasons: mr_reasons,
                });
            }
        }

        signals.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Sorted descending, so the first occurrence of a mint is its best
        let mut seen: HashSet<String> = HashSet::new();
        signals.retain(|s| seen.insert(s.mint.clone()));

        debug!(
            "scored {} candidates, {} signals qualified",
            candidates.len(),
            signals.len()
        );
        signals
    }

    /// Samples held for a mint (used by status reporting).
    pub fn sample_count(&self, mint: &str) -> usize {
        self.history.sample_count(mint)
    }
}
