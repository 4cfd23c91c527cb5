//! Risk manager
//!
//! Gate for opening positions, position sizing, SL/TP computation, the
//! portfolio kill-switch evaluation and per-position close checks. The
//! kill switch is a one-way latch: tripping it here denies every future
//! open until the process restarts with a fresh load.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::alerts::AlertSink;
use super::portfolio::{
    CloseReason, OpenPosition, PortfolioSnapshot, PortfolioStore, MIN_TRADE_USDC,
};
use crate::strategy::Strategy;

/// Mean-reversion positions use fixed tighter bounds
pub const MEAN_REVERSION_SL_MULT: f64 = 0.92;
pub const MEAN_REVERSION_TP_MULT: f64 = 1.10;

/// Risk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Maximum simultaneous open positions
    pub max_positions: usize,
    /// Maximum USDC notional per position
    pub max_position_size_usdc: f64,
    /// Stop loss percent for non-mean-reversion strategies (negative)
    pub stop_loss_pct: f64,
    /// Take profit percent for non-mean-reversion strategies (positive)
    pub take_profit_pct: f64,
    /// Portfolio-wide loss percent that trips the kill switch (negative)
    pub kill_switch_threshold_pct: f64,
    /// Hours after which a flat-or-losing position is force-closed
    pub time_stop_hours: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_positions: 3,
            max_position_size_usdc: 50.0,
            stop_loss_pct: -15.0,
            take_profit_pct: 30.0,
            kill_switch_threshold_pct: -30.0,
            time_stop_hours: 24,
        }
    }
}

/// Why an open was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Kill switch was already latched
    KillSwitchActive,
    /// This evaluation crossed the loss threshold and latched it
    KillSwitchTripped,
    MaxPositionsReached,
    InsufficientCapital,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::KillSwitchActive => write!(f, "kill switch active"),
            DenyReason::KillSwitchTripped => write!(f, "kill switch tripped by loss threshold"),
            DenyReason::MaxPositionsReached => write!(f, "max positions reached"),
            DenyReason::InsufficientCapital => write!(f, "capital below dust floor"),
        }
    }
}

/// Outcome of the open gate
#[derive(Debug, Clone, Copy)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
    /// Largest notional an approved open may spend
    pub max_size: Option<f64>,
}

impl GateDecision {
    fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            max_size: None,
        }
    }

    fn allow(max_size: f64) -> Self {
        Self {
            allowed: true,
            reason: None,
            max_size: Some(max_size),
        }
    }
}

/// Stop-loss / take-profit price pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlTp {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Portfolio risk gatekeeper
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluate the open gate. First failing check wins; the loss
    /// threshold check latches the kill switch as a side effect.
    pub fn can_open_position(&self, store: &mut PortfolioStore) -> GateDecision {
        if store.portfolio().kill_switch_triggered {
            return GateDecision::deny(DenyReason::KillSwitchActive);
        }

        if store.portfolio().pnl_pct() <= self.config.kill_switch_threshold_pct {
            store.trip_kill_switch();
            return GateDecision::deny(DenyReason::KillSwitchTripped);
        }

        if store.portfolio().positions.len() >= self.config.max_positions {
            return GateDecision::deny(DenyReason::MaxPositionsReached);
        }

        let capital = store.portfolio().capital_usdc;
        if capital < MIN_TRADE_USDC {
            return GateDecision::deny(DenyReason::InsufficientCapital);
        }

        GateDecision::allow(self.config.max_position_size_usdc.min(capital))
    }

    /// Size a position from the signal score. Re-derives the gate, so
    /// the size is zero whenever the gate would deny. Scales from the
    /// midpoint to the full `max_size` as the score runs 50..100,
    /// rounded to cents. Callers must still reject sizes below
    /// [`MIN_TRADE_USDC`].
    pub fn calculate_position_size(&self, store: &mut PortfolioStore, score: f64) -> f64 {
        let gate = self.can_open_position(store);
        let Some(max_size) = gate.max_size else {
            return 0.0;
        };

        let size = (max_size * (0.5 + score / 200.0)).min(max_size);
        (size * 100.0).round() / 100.0
    }

    /// SL/TP prices for a long entry.
    pub fn calculate_sl_tp(&self, entry_price: f64, strategy: Strategy) -> SlTp {
        match strategy {
            Strategy::MeanReversion => SlTp {
                stop_loss: entry_price * MEAN_REVERSION_SL_MULT,
                take_profit: entry_price * MEAN_REVERSION_TP_MULT,
            },
            _ => SlTp {
                stop_loss: entry_price * (1.0 + self.config.stop_loss_pct / 100.0),
                take_profit: entry_price * (1.0 + self.config.take_profit_pct / 100.0),
            },
        }
    }

    /// SL/TP prices for a short entry: mirrored around the entry, so the
    /// stop sits above and the target below.
    pub fn calculate_short_sl_tp(&self, entry_price: f64) -> SlTp {
        SlTp {
            stop_loss: entry_price * (1.0 - self.config.stop_loss_pct / 100.0),
            take_profit: entry_price * (1.0 - self.config.take_profit_pct / 100.0),
        }
    }

    /// SL/TP close check at the current price. Stop loss wins over take
    /// profit when both would somehow trigger.
    pub fn check_position(&self, position: &OpenPosition, current_price: f64) -> Option<CloseReason> {
        match position {
            OpenPosition::Long(p) => {
                if current_price <= p.stop_loss {
                    Some(CloseReason::StopLoss)
                } else if current_price >= p.take_profit {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
            OpenPosition::Short(p) => {
                if current_price >= p.stop_loss {
                    Some(CloseReason::StopLoss)
                } else if current_price <= p.take_profit {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
        }
    }

    /// Time stop: a position past the horizon with nothing to show for
    /// it is cut. Evaluated only when SL/TP did not already trigger.
    pub fn check_time_stop(
        &self,
        opened_at: u64,
        unrealized_pnl: f64,
        now: u64,
    ) -> Option<CloseReason> {
        let age_secs = now.saturating_sub(opened_at);
        if age_secs > self.config.time_stop_hours * 3600 && unrealized_pnl <= 0.0 {
            Some(CloseReason::TimeStop)
        } else {
            None
        }
    }

    /// Read-only portfolio health check. Emits a monitoring event; never
    /// mutates state.
    pub fn portfolio_check(&self, store: &PortfolioStore, alerts: &AlertSink) -> PortfolioSnapshot {
        let snapshot = store.snapshot();
        debug!(
            "portfolio: ${:.2} capital, {} open, pnl ${:+.2} ({:+.2}%), kill switch {}",
            snapshot.capital_usdc,
            snapshot.open_positions,
            snapshot.total_pnl,
            snapshot.pnl_pct,
            snapshot.kill_switch_triggered
        );
        if snapshot.kill_switch_triggered {
            info!("kill switch is latched; entries remain halted");
        }
        alerts.emit(
            "PORTFOLIO_CHECK",
            "periodic portfolio health check",
            serde_json::to_value(&snapshot).unwrap_or_default(),
        );
        snapshot
    }
}
