//! Portfolio store
//!
//! Single source of truth for capital, open positions, closed-trade
//! history and the kill-switch latch. All mutation goes through named
//! operations that also perform the durable write - callers never touch
//! fields directly, and capital only moves on open (deduct) and close
//! (credit).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

use super::grid::{GridEngine, GridError, GridPortfolio};
use super::persistence::{load_state, save_state, BotState};
use super::short_pnl::short_pnl;
use crate::ports::TokenSnapshot;
use crate::strategy::Strategy;

/// Trades below this notional are uneconomical
pub const MIN_TRADE_USDC: f64 = 5.0;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Insufficient capital: have {have:.2}, need {need:.2}")]
    InsufficientCapital { have: f64, need: f64 },

    #[error("Invalid SL/TP bounds for entry {entry}: sl={stop_loss}, tp={take_profit}")]
    InvalidBounds {
        entry: f64,
        stop_loss: f64,
        take_profit: f64,
    },
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    #[serde(rename = "STOP_LOSS")]
    StopLoss,
    #[serde(rename = "TAKE_PROFIT")]
    TakeProfit,
    #[serde(rename = "TIME_STOP_24H")]
    TimeStop,
    #[serde(rename = "MANUAL")]
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::StopLoss => write!(f, "STOP_LOSS"),
            CloseReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            CloseReason::TimeStop => write!(f, "TIME_STOP_24H"),
            CloseReason::Manual => write!(f, "MANUAL"),
        }
    }
}

/// Direction of a trade in the closed-trade history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

/// An open long position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub token: String,
    pub mint: String,
    pub entry_price: f64,
    /// Tokens held
    pub amount: f64,
    pub usdc_spent: f64,
    /// Unix seconds
    pub opened_at: u64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub strategy: Strategy,
    pub signal_score: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.amount * current_price - self.usdc_spent
    }
}

/// An open short position on the perps venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortPosition {
    pub id: String,
    pub token: String,
    pub mint: String,
    /// Perps market identifier (e.g. "SOL-PERP")
    pub market: String,
    pub entry_price: f64,
    /// Base asset amount sold short
    pub base_amount: f64,
    pub usdc_spent: f64,
    pub leverage: f64,
    pub opened_at: u64,
    /// Above entry for a short
    pub stop_loss: f64,
    /// Below entry for a short
    pub take_profit: f64,
    pub strategy: Strategy,
    pub signal_score: f64,
}

impl ShortPosition {
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        short_pnl(self.entry_price, current_price, self.usdc_spent).pnl
    }
}

/// Either side of an open position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpenPosition {
    Long(Position),
    Short(ShortPosition),
}

impl OpenPosition {
    pub fn id(&self) -> &str {
        match self {
            OpenPosition::Long(p) => &p.id,
            OpenPosition::Short(p) => &p.id,
        }
    }

    pub fn mint(&self) -> &str {
        match self {
            OpenPosition::Long(p) => &p.mint,
            OpenPosition::Short(p) => &p.mint,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            OpenPosition::Long(_) => Side::Long,
            OpenPosition::Short(_) => Side::Short,
        }
    }
}

/// A closed trade in the append-only history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: String,
    pub token: String,
    pub mint: String,
    pub side: Side,
    pub strategy: Strategy,
    pub entry_price: f64,
    pub exit_price: f64,
    pub usdc_spent: f64,
    pub usdc_received: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub opened_at: u64,
    pub closed_at: u64,
    pub reason: CloseReason,
}

/// Persistable portfolio state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub capital_usdc: f64,
    pub initial_capital: f64,
    pub positions: Vec<OpenPosition>,
    pub closed_trades: Vec<ClosedTrade>,
    pub total_pnl: f64,
    pub trade_count: u64,
    /// One-way latch; never reset within a process lifetime
    pub kill_switch_triggered: bool,
    next_position_id: u64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital_usdc: initial_capital,
            initial_capital,
            positions: Vec::new(),
            closed_trades: Vec::new(),
            total_pnl: 0.0,
            trade_count: 0,
            kill_switch_triggered: false,
            next_position_id: 1,
        }
    }

    pub fn pnl_pct(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        self.total_pnl / self.initial_capital * 100.0
    }

    pub fn find_by_mint(&self, mint: &str) -> Option<&OpenPosition> {
        self.positions.iter().find(|p| p.mint() == mint)
    }

    fn next_id(&mut self, side: Side) -> String {
        let id = self.next_position_id;
        self.next_position_id += 1;
        match side {
            Side::Long => format!("pos-{}", id),
            Side::Short => format!("short-{}", id),
        }
    }
}

/// Read-only portfolio summary for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub capital_usdc: f64,
    pub initial_capital: f64,
    pub open_positions: usize,
    pub total_pnl: f64,
    pub pnl_pct: f64,
    pub closed_trades: usize,
    pub win_rate_pct: f64,
    pub kill_switch_triggered: bool,
}

/// Owns the full bot state and the persistence path.
///
/// Every mutating operation writes the state document synchronously so a
/// mid-cycle kill never loses a recorded trade. A failed write is logged
/// and remembered so the orchestrator can surface it to an operator.
#[derive(Debug)]
pub struct PortfolioStore {
    state: BotState,
    path: Option<PathBuf>,
    save_error: Option<String>,
}

impl PortfolioStore {
    /// Load persisted state or start fresh. A corrupt document is
    /// treated as absent.
    pub fn load_or_default(path: PathBuf, initial_capital: f64) -> Self {
        let state = load_state(&path, initial_capital);
        Self {
            state,
            path: Some(path),
            save_error: None,
        }
    }

    /// Ephemeral store for tests and dry runs.
    pub fn in_memory(initial_capital: f64) -> Self {
        Self {
            state: BotState::new(initial_capital),
            path: None,
            save_error: None,
        }
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.state.portfolio
    }

    pub fn grid(&self) -> &GridPortfolio {
        &self.state.grid
    }

    /// Put a token on the grid: reserves capital, records, saves.
    pub fn activate_grid(
        &mut self,
        engine: &GridEngine,
        snapshot: &TokenSnapshot,
    ) -> Result<(), GridError> {
        engine.try_activate(&mut self.state.grid, snapshot)?;
        self.persist();
        Ok(())
    }

    /// Record an executed grid buy: books the fill, saves.
    pub fn record_grid_buy(
        &mut self,
        engine: &GridEngine,
        mint: &str,
        level: f64,
        amount: f64,
        usdc_spent: f64,
        now: u64,
    ) -> Result<u64, GridError> {
        let id = engine.apply_buy(&mut self.state.grid, mint, level, amount, usdc_spent, now)?;
        self.persist();
        Ok(id)
    }

    /// Record an executed grid sell: realizes pnl, saves.
    pub fn record_grid_sell(
        &mut self,
        engine: &GridEngine,
        mint: &str,
        fill_id: u64,
        usdc_received: f64,
    ) -> Result<f64, GridError> {
        let pnl = engine.apply_sell(&mut self.state.grid, mint, fill_id, usdc_received)?;
        self.persist();
        Ok(pnl)
    }

    /// Take a token off the grid: releases its reservation, saves.
    pub fn deactivate_grid(&mut self, engine: &GridEngine, mint: &str) -> Result<(), GridError> {
        engine.deactivate(&mut self.state.grid, mint)?;
        self.persist();
        Ok(())
    }

    /// Update the last seen price for cross detection and save it.
    pub fn mark_grid_price(&mut self, engine: &GridEngine, mint: &str, price: f64) {
        engine.mark_price(&mut self.state.grid, mint, price);
        self.persist();
    }

    /// Open a long position: deducts capital, records, saves.
    #[allow(clippy::too_many_arguments)]
    pub fn open_long(
        &mut self,
        token: &str,
        mint: &str,
        entry_price: f64,
        amount: f64,
        usdc_spent: f64,
        stop_loss: f64,
        take_profit: f64,
        strategy: Strategy,
        signal_score: f64,
        now: u64,
    ) -> Result<String, PortfolioError> {
        if !(stop_loss < entry_price && entry_price < take_profit) {
            return Err(PortfolioError::InvalidBounds {
                entry: entry_price,
                stop_loss,
                take_profit,
            });
        }
        let portfolio = &mut self.state.portfolio;
        if usdc_spent > portfolio.capital_usdc {
            return Err(PortfolioError::InsufficientCapital {
                have: portfolio.capital_usdc,
                need: usdc_spent,
            });
        }

        let id = portfolio.next_id(Side::Long);
        portfolio.capital_usdc -= usdc_spent;
        portfolio.positions.push(OpenPosition::Long(Position {
            id: id.clone(),
            token: token.to_string(),
            mint: mint.to_string(),
            entry_price,
            amount,
            usdc_spent,
            opened_at: now,
            stop_loss,
            take_profit,
            strategy,
            signal_score,
        }));

        info!(
            "opened {} {} @ ${:.6} (${:.2}, sl ${:.6}, tp ${:.6})",
            id, token, entry_price, usdc_spent, stop_loss, take_profit
        );
        self.persist();
        Ok(id)
    }

    /// Open a short position: deducts the committed notional, records,
    /// saves.
    #[allow(clippy::too_many_arguments)]
    pub fn open_short(
        &mut self,
        token: &str,
        mint: &str,
        market: &str,
        entry_price: f64,
        base_amount: f64,
        usdc_spent: f64,
        leverage: f64,
        stop_loss: f64,
        take_profit: f64,
        strategy: Strategy,
        signal_score: f64,
        now: u64,
    ) -> Result<String, PortfolioError> {
        if !(take_profit < entry_price && entry_price < stop_loss) {
            return Err(PortfolioError::InvalidBounds {
                entry: entry_price,
                stop_loss,
                take_profit,
            });
        }
        let portfolio = &mut self.state.portfolio;
        if usdc_spent > portfolio.capital_usdc {
            return Err(PortfolioError::InsufficientCapital {
                have: portfolio.capital_usdc,
                need: usdc_spent,
            });
        }

        let id = portfolio.next_id(Side::Short);
        portfolio.capital_usdc -= usdc_spent;
        portfolio.positions.push(OpenPosition::Short(ShortPosition {
            id: id.clone(),
            token: token.to_string(),
            mint: mint.to_string(),
            market: market.to_string(),
            entry_price,
            base_amount,
            usdc_spent,
            leverage,
            opened_at: now,
            stop_loss,
            take_profit,
            strategy,
            signal_score,
        }));

        info!(
            "opened {} {} short @ ${:.6} (${:.2} x{})",
            id, token, entry_price, usdc_spent, leverage
        );
        self.persist();
        Ok(id)
    }

    /// Close a long position with the proceeds received from execution.
    pub fn close_long(
        &mut self,
        id: &str,
        exit_price: f64,
        usdc_received: f64,
        reason: CloseReason,
        now: u64,
    ) -> Result<ClosedTrade, PortfolioError> {
        let portfolio = &mut self.state.portfolio;
        let idx = portfolio
            .positions
            .iter()
            .position(|p| p.id() == id && matches!(p, OpenPosition::Long(_)))
            .ok_or_else(|| PortfolioError::PositionNotFound(id.to_string()))?;

        let OpenPosition::Long(position) = portfolio.positions.remove(idx) else {
            unreachable!("filtered to longs above");
        };

        let pnl = usdc_received - position.usdc_spent;
        let trade = ClosedTrade {
            id: position.id,
            token: position.token,
            mint: position.mint,
            side: Side::Long,
            strategy: position.strategy,
            entry_price: position.entry_price,
            exit_price,
            usdc_spent: position.usdc_spent,
            usdc_received,
            pnl,
            pnl_percent: if position.usdc_spent > 0.0 {
                pnl / position.usdc_spent * 100.0
            } else {
                0.0
            },
            opened_at: position.opened_at,
            closed_at: now,
            reason,
        };

        portfolio.capital_usdc += usdc_received;
        portfolio.total_pnl += pnl;
        portfolio.trade_count += 1;
        portfolio.closed_trades.push(trade.clone());

        info!(
            "closed {} {} @ ${:.6} [{}] pnl ${:+.2} ({:+.2}%)",
            trade.id, trade.token, exit_price, reason, trade.pnl, trade.pnl_percent
        );
        self.persist();
        Ok(trade)
    }

    /// Close a short position at the given exit price. Proceeds credited
    /// are the committed notional plus the short PnL.
    pub fn close_short(
        &mut self,
        id: &str,
        exit_price: f64,
        reason: CloseReason,
        now: u64,
    ) -> Result<ClosedTrade, PortfolioError> {
        let portfolio = &mut self.state.portfolio;
        let idx = portfolio
            .positions
            .iter()
            .position(|p| p.id() == id && matches!(p, OpenPosition::Short(_)))
            .ok_or_else(|| PortfolioError::PositionNotFound(id.to_string()))?;

        let OpenPosition::Short(position) = portfolio.positions.remove(idx) else {
            unreachable!("filtered to shorts above");
        };

        let result = short_pnl(position.entry_price, exit_price, position.usdc_spent);
        let usdc_received = position.usdc_spent + result.pnl;
        let trade = ClosedTrade {
            id: position.id,
            token: position.token,
            mint: position.mint,
            side: Side::Short,
            strategy: position.strategy,
            entry_price: position.entry_price,
            exit_price,
            usdc_spent: position.usdc_spent,
            usdc_received,
            pnl: result.pnl,
            pnl_percent: result.pnl_pct,
            opened_at: position.opened_at,
            closed_at: now,
            reason,
        };

        portfolio.capital_usdc += usdc_received;
        portfolio.total_pnl += result.pnl;
        portfolio.trade_count += 1;
        portfolio.closed_trades.push(trade.clone());

        info!(
            "closed {} {} short @ ${:.6} [{}] pnl ${:+.2} ({:+.2}%)",
            trade.id, trade.token, exit_price, reason, trade.pnl, trade.pnl_percent
        );
        self.persist();
        Ok(trade)
    }

    /// Trip the portfolio kill switch. One-way: there is no clearing
    /// operation; restart with a fresh load is the only reset.
    pub fn trip_kill_switch(&mut self) {
        if !self.state.portfolio.kill_switch_triggered {
            self.state.portfolio.kill_switch_triggered = true;
            warn!(
                "KILL SWITCH TRIPPED at pnl {:.2}% - no further entries",
                self.state.portfolio.pnl_pct()
            );
            self.persist();
        }
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        let p = &self.state.portfolio;
        let wins = p.closed_trades.iter().filter(|t| t.pnl > 0.0).count();
        let closed = p.closed_trades.len();
        PortfolioSnapshot {
            capital_usdc: p.capital_usdc,
            initial_capital: p.initial_capital,
            open_positions: p.positions.len(),
            total_pnl: p.total_pnl,
            pnl_pct: p.pnl_pct(),
            closed_trades: closed,
            win_rate_pct: if closed > 0 {
                wins as f64 / closed as f64 * 100.0
            } else {
                0.0
            },
            kill_switch_triggered: p.kill_switch_triggered,
        }
    }

    /// Write the state document. Failures are logged and remembered, not
    /// propagated; losing the process matters less than halting the loop.
    pub fn persist(&mut self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = save_state(path, &self.state) {
            error!("state save failed: {}", e);
            self.save_error = Some(e.to_string());
        }
    }

    /// Take the last save error, if any, so the caller can alert once.
    pub fn take_save_error(&mut self) -> Option<String> {
        self.save_error.take()
    }
}
