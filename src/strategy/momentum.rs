//! Momentum scorer
//!
//! Additive 0-100 score from volume spikes, buy pressure, short-term
//! momentum and breakout conditions, with penalties for a dumping 1h
//! candle or sell-side dominance.

use crate::ports::market_data::TokenSnapshot;

/// Liquidity level treated as "deep" across both scorers ($5M)
pub const DEEP_LIQUIDITY_USD: f64 = 5_000_000.0;

/// Score a candidate under the momentum strategy.
///
/// Returns the clamped score plus human-readable reasons for each
/// component that fired.
pub fn score_momentum(snap: &TokenSnapshot, spike_multiplier: f64) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    // Volume spike vs the hourly baseline implied by the 6h window
    let hourly_baseline = snap.volume_6h / 6.0;
    if hourly_baseline > 0.0 && snap.volume_1h > hourly_baseline * spike_multiplier {
        let spike_ratio = snap.volume_1h / hourly_baseline;
        let bonus = (spike_ratio * 10.0).min(30.0);
        score += bonus;
        reasons.push(format!("volume spike {:.1}x baseline", spike_ratio));
    }

    let buy_ratio = snap.txns_24h.buy_ratio();
    if buy_ratio > 0.55 {
        let bonus = ((buy_ratio - 0.5) * 100.0).min(25.0);
        score += bonus;
        reasons.push(format!("buy pressure {:.0}%", buy_ratio * 100.0));
    }

    if snap.price_change_1h > 2.0 {
        let bonus = (snap.price_change_1h * 2.0).min(20.0);
        score += bonus;
        reasons.push(format!("1h momentum +{:.1}%", snap.price_change_1h));
    }

    if snap.price_change_6h > 0.0 && snap.price_change_24h > 0.0 {
        score += 10.0;
        reasons.push("sustained 6h/24h uptrend".to_string());
    }

    if snap.liquidity_usd > DEEP_LIQUIDITY_USD {
        score += 5.0;
        reasons.push("deep liquidity".to_string());
    }

    if snap.price_change_1h > 5.0 && snap.volume_1h > 100_000.0 {
        score += 10.0;
        reasons.push("breakout on volume".to_string());
    }

    if snap.price_change_1h < -3.0 {
        score -= 20.0;
        reasons.push(format!("1h dump {:.1}%", snap.price_change_1h));
    }

    if snap.txns_24h.sells as f64 > snap.txns_24h.buys as f64 * 1.5 {
        score -= 15.0;
        reasons.push("sell-side dominance".to_string());
    }

    (score.clamp(0.0, 100.0), reasons)
}
