//! Strategy Layer - Signal scoring and market regime classification
//!
//! Two competing entry strategies score every discovered candidate:
//! - `momentum`: volume spikes, buy pressure, breakouts
//! - `mean_reversion`: z-score/RSI oversold conditions with a cold-start
//!   proxy while history warms up
//!
//! `signals` runs both and deduplicates per token; `trend` gates which
//! side of the book new entries go to.

pub mod history;
pub mod mean_reversion;
pub mod momentum;
pub mod signals;
pub mod trend;

pub use history::{Indicators, PriceHistory, MIN_SAMPLES_FOR_INDICATORS};
pub use mean_reversion::score_mean_reversion;
pub use momentum::score_momentum;
pub use signals::{Signal, SignalConfig, SignalEngine, Strategy};
pub use trend::{Regime, TrendConfig, TrendFilter};
