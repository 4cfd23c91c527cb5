//! Mean-reversion scorer
//!
//! Scores oversold candidates from the indicator bundle when enough
//! history exists, or from a coarse price-change proxy during cold start.
//! A price sitting above its rolling mean is disqualifying.

use super::history::Indicators;
use super::momentum::DEEP_LIQUIDITY_USD;
use crate::ports::market_data::TokenSnapshot;

/// Score a candidate under the mean-reversion strategy.
pub fn score_mean_reversion(snap: &TokenSnapshot, indicators: Option<&Indicators>) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    match indicators {
        Some(ind) => {
            if ind.z_score < -1.5 {
                let bonus = (ind.z_score.abs() * 12.0).min(30.0);
                score += bonus;
                reasons.push(format!("deeply oversold z={:.2}", ind.z_score));
            } else if ind.z_score < -1.0 {
                score += 15.0;
                reasons.push(format!("oversold z={:.2}", ind.z_score));
            }

            if ind.rsi < 25.0 {
                score += 25.0;
                reasons.push(format!("RSI {:.0} extreme", ind.rsi));
            } else if ind.rsi < 35.0 {
                score += 15.0;
                reasons.push(format!("RSI {:.0} low", ind.rsi));
            }

            if ind.drop_from_high_pct < -10.0 {
                score += 15.0;
                reasons.push(format!("{:.1}% off recent high", ind.drop_from_high_pct));
            } else if ind.drop_from_high_pct < -5.0 {
                score += 8.0;
                reasons.push(format!("{:.1}% off recent high", ind.drop_from_high_pct));
            }

            // Above the mean there is nothing to revert to
            if ind.z_score > 0.5 {
                score -= 30.0;
                reasons.push("price above rolling mean".to_string());
            }
        }
        None => {
            // Cold start: proxy oversold detection from price-change fields
            if snap.price_change_24h < -10.0 {
                score += 20.0;
                reasons.push(format!("24h down {:.1}%", snap.price_change_24h));
            } else if snap.price_change_24h < -5.0 {
                score += 10.0;
                reasons.push(format!("24h down {:.1}%", snap.price_change_24h));
            }

            if snap.price_change_6h < -8.0 {
                score += 15.0;
                reasons.push(format!("6h down {:.1}%", snap.price_change_6h));
            } else if snap.price_change_6h < -4.0 {
                score += 8.0;
                reasons.push(format!("6h down {:.1}%", snap.price_change_6h));
            }

            if snap.price_change_1h > 0.0 && snap.price_change_6h < -5.0 {
                score += 10.0;
                reasons.push("1h bounce forming".to_string());
            }
        }
    }

    // Shared add-ons on both paths
    if snap.volume_1h > 50_000.0 {
        score += 5.0;
        reasons.push("active 1h volume".to_string());
    }
    if snap.volume_1h < 10_000.0 {
        score -= 10.0;
        reasons.push("thin 1h volume".to_string());
    }

    if snap.txns_24h.buy_ratio() > 0.5 && snap.price_change_24h < -5.0 {
        score += 10.0;
        reasons.push("buyers absorbing the dip".to_string());
    }

    if snap.liquidity_usd > DEEP_LIQUIDITY_USD {
        score += 5.0;
        reasons.push("deep liquidity".to_string());
    }

    if snap.price_change_1h < -5.0 && snap.price_change_6h < -10.0 {
        score -= 25.0;
        reasons.push("freefall".to_string());
    }

    (score.clamp(0.0, 100.0), reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::market_data::TxnCounts;

    fn snapshot() -> TokenSnapshot {
        TokenSnapshot {
            token: "TEST".to_string(),
            mint: "mint-test".to_string(),
            price: 1.0,
            liquidity_usd: 500_000.0,
            volume_24h: 600_000.0,
            volume_6h: 120_000.0,
            volume_1h: 20_000.0,
            price_change_24h: 0.0,
            price_change_6h: 0.0,
            price_change_1h: 0.0,
            txns_24h: TxnCounts { buys: 100, sells: 100 },
        }
    }

    fn indicators(z: f64, rsi: f64, drop: f64) -> Indicators {
        Indicators {
            sma: 1.0,
            std_dev: 0.1,
            z_score: z,
            rsi,
            deviation_pct: z * 10.0,
            drop_from_high_pct: drop,
        }
    }

    #[test]
    fn test_deep_oversold_bonus_scaled_and_capped() {
        let ind = indicators(-2.0, 50.0, 0.0);
        let (score, _) = score_mean_reversion(&snapshot(), Some(&ind));
        // |z| * 12 = 24
        assert!((score - 24.0).abs() < 1e-9);

        let ind = indicators(-4.0, 50.0, 0.0);
        let (score, _) = score_mean_reversion(&snapshot(), Some(&ind));
        assert_eq!(score, 30.0);
    }

    #[test]
    fn test_mild_oversold_flat_bonus() {
        let ind = indicators(-1.2, 50.0, 0.0);
        let (score, _) = score_mean_reversion(&snapshot(), Some(&ind));
        assert_eq!(score, 15.0);
    }

    #[test]
    fn test_rsi_tiers() {
        let ind = indicators(0.0, 20.0, 0.0);
        let (score, _) = score_mean_reversion(&snapshot(), Some(&ind));
        assert_eq!(score, 25.0);

        let ind = indicators(0.0, 30.0, 0.0);
        let (score, _) = score_mean_reversion(&snapshot(), Some(&ind));
        assert_eq!(score, 15.0);
    }

    #[test]
    fn test_above_mean_disqualifies() {
        let ind = indicators(1.0, 20.0, -12.0);
        let (score, reasons) = score_mean_reversion(&snapshot(), Some(&ind));
        // +25 RSI, +15 drop, -30 above mean
        assert!((score - 10.0).abs() < 1e-9);
        assert!(reasons.iter().any(|r| r.contains("above rolling mean")));
    }

    #[test]
    fn test_cold_start_proxy_path() {
        let mut snap = snapshot();
        snap.price_change_24h = -12.0;
        snap.price_change_6h = -9.0;
        snap.price_change_1h = 0.5;
        snap.txns_24h = TxnCounts { buys: 120, sells: 80 };
        // +20 + 15 + 10 proxy, +10 buyers absorbing
        let (score, _) = score_mean_reversion(&snap, None);
        assert!((score - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_freefall_penalty() {
        let mut snap = snapshot();
        snap.price_change_24h = -12.0;
        snap.price_change_6h = -12.0;
        snap.price_change_1h = -6.0;
        let (score, reasons) = score_mean_reversion(&snap, None);
        // proxy +20 +15, penalty -25
        assert!((score - 10.0).abs() < 1e-9);
        assert!(reasons.iter().any(|r| r == "freefall"));
    }

    #[test]
    fn test_thin_volume_penalty() {
        let mut snap = snapshot();
        snap.volume_1h = 5_000.0;
        snap.price_change_24h = -6.0;
        // proxy +10, thin volume -10
        let (score, _) = score_mean_reversion(&snap, None);
        assert_eq!(score, 0.0);
    }
}
