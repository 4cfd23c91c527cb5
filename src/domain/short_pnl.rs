//! Short position PnL
//!
//! A short profits as price falls: PnL is the entry-relative price drop
//! applied to the USDC notional committed at entry.

/// PnL of a short position at a given mark price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortPnl {
    /// Unrealized PnL in USDC (positive when price fell)
    pub pnl: f64,
    /// PnL as a percentage of the committed notional
    pub pnl_pct: f64,
}

/// Compute short PnL from entry price, current price and committed
/// notional. Zero for a degenerate entry price.
pub fn short_pnl(entry_price: f64, current_price: f64, usdc_spent: f64) -> ShortPnl {
    if entry_price <= 0.0 {
        return ShortPnl { pnl: 0.0, pnl_pct: 0.0 };
    }
    let price_diff = entry_price - current_price;
    ShortPnl {
        pnl: price_diff / entry_price * usdc_spent,
        pnl_pct: price_diff / entry_price * 100.0,
    }
}
