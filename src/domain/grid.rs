//! Grid trading sub-engine
//!
//! Ping-pong grid on stable, liquid tokens: evenly spread levels around
//! a base price, buy when the price crosses down through a level, sell
//! each fill when the price comes back up to the next level above. The
//! engine itself is stateless; all grid state lives in [`GridPortfolio`]
//! inside the persisted bot state, and planning is pure so callers can
//! execute fills before applying them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ports::TokenSnapshot;

/// Buy triggers allow a small overshoot past the level
pub const BUY_CROSS_TOLERANCE: f64 = 1.002;
/// A level already holding a fill within this fraction is skipped
pub const LEVEL_DEDUPE_PCT: f64 = 0.5;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Grid token not found: {0}")]
    TokenNotFound(String),

    #[error("Grid capital exhausted: allocated {allocated:.2} of {max:.2}")]
    CapitalExhausted { allocated: f64, max: f64 },

    #[error("Token already on the grid: {0}")]
    AlreadyActive(String),
}

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Total USDC the grid may commit across all tokens
    pub max_grid_capital: f64,
    /// USDC spent per level fill
    pub capital_per_level: f64,
    /// Percent spacing between adjacent levels
    pub spread_pct: f64,
    /// Levels on each side of the base price
    pub level_count: usize,
    /// Maximum tokens on the grid at once
    pub max_grid_tokens: usize,
    pub min_liquidity_usd: f64,
    /// Tokens moving more than this in 24h are too volatile for a grid
    pub max_volatility_pct: f64,
    pub min_volume_24h: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_grid_capital: 100.0,
            capital_per_level: 10.0,
            spread_pct: 2.0,
            level_count: 3,
            max_grid_tokens: 2,
            min_liquidity_usd: 2_000_000.0,
            max_volatility_pct: 8.0,
            min_volume_24h: 500_000.0,
        }
    }
}

/// A buy that has filled and is waiting for its sell level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledBuy {
    pub id: u64,
    /// Level the buy filled at
    pub level: f64,
    /// Next level above; `None` for a fill at the top of the grid,
    /// which then never sells
    pub sell_level: Option<f64>,
    /// Tokens bought
    pub amount: f64,
    pub usdc_spent: f64,
    pub bought_at: u64,
}

/// Per-token grid state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridTokenState {
    pub mint: String,
    pub token: String,
    pub base_price: f64,
    /// Ascending, includes the base price
    pub grid_levels: Vec<f64>,
    pub filled_buys: Vec<FilledBuy>,
    pub last_price: Option<f64>,
    /// Inactive grids stop buying but still sell out their fills
    pub active: bool,
    /// Capital held back for this token's unfilled levels
    pub reserved_usdc: f64,
}

/// All grid state across tokens, persisted with the portfolio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridPortfolio {
    pub tokens: HashMap<String, GridTokenState>,
    pub total_pnl: f64,
    pub total_trades: u64,
    /// USDC committed to reservations plus live fills
    pub capital_allocated: f64,
    next_fill_id: u64,
}

impl GridPortfolio {
    pub fn active_tokens(&self) -> usize {
        self.tokens.values().filter(|t| t.active).count()
    }

    fn next_fill_id(&mut self) -> u64 {
        self.next_fill_id += 1;
        self.next_fill_id
    }
}

/// A planned trade the caller must execute then apply
#[derive(Debug, Clone, PartialEq)]
pub enum GridAction {
    Buy {
        mint: String,
        level: f64,
        usdc_amount: f64,
    },
    Sell {
        mint: String,
        fill_id: u64,
        amount: f64,
        sell_level: f64,
    },
}

/// Stateless planner over [`GridPortfolio`]
#[derive(Debug, Clone)]
pub struct GridEngine {
    config: GridConfig,
}

impl GridEngine {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Build the level ladder around a base price: `level_count` levels
    /// on each side spaced by `spread_pct`, plus the base itself,
    /// ascending.
    pub fn build_levels(&self, base_price: f64) -> Vec<f64> {
        let mut levels = Vec::with_capacity(self.config.level_count * 2 + 1);
        for i in 1..=self.config.level_count {
            let offset = self.config.spread_pct / 100.0 * i as f64;
            levels.push(base_price * (1.0 - offset));
            levels.push(base_price * (1.0 + offset));
        }
        levels.push(base_price);
        levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        levels
    }

    /// Filter and rank discovery output for grid suitability: deep
    /// liquidity, low 24h movement, real volume. Best liquidity first.
    pub fn select_candidates<'a>(&self, snapshots: &'a [TokenSnapshot]) -> Vec<&'a TokenSnapshot> {
        let mut picks: Vec<&TokenSnapshot> = snapshots
            .iter()
            .filter(|s| {
                s.liquidity_usd >= self.config.min_liquidity_usd
                    && s.price_change_24h.abs() <= self.config.max_volatility_pct
                    && s.volume_24h >= self.config.min_volume_24h
            })
            .collect();
        picks.sort_by(|a, b| {
            b.liquidity_usd
                .partial_cmp(&a.liquidity_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        picks
    }

    /// A token already on the grid should come off once its 24h movement
    /// breaches the volatility ceiling it was selected under.
    pub fn should_retire(&self, snapshot: &TokenSnapshot) -> bool {
        snapshot.price_change_24h.abs() > self.config.max_volatility_pct
    }

    /// Put a token on the grid, reserving capital for every level up
    /// front so concurrent grids cannot over-commit.
    pub fn try_activate(
        &self,
        grid: &mut GridPortfolio,
        snapshot: &TokenSnapshot,
    ) -> Result<(), GridError> {
        if grid
            .tokens
            .get(&snapshot.mint)
            .is_some_and(|t| t.active)
        {
            return Err(GridError::AlreadyActive(snapshot.mint.clone()));
        }
        if grid.active_tokens() >= self.config.max_grid_tokens {
            return Err(GridError::CapitalExhausted {
                allocated: grid.capital_allocated,
                max: self.config.max_grid_capital,
            });
        }

        let levels = self.build_levels(snapshot.price);
        let reservation = self.config.capital_per_level * levels.len() as f64;
        if grid.capital_allocated + reservation > self.config.max_grid_capital {
            return Err(GridError::CapitalExhausted {
                allocated: grid.capital_allocated,
                max: self.config.max_grid_capital,
            });
        }

        // A fill at the top level has no level above to sell at
        debug!(
            "grid {}: top level ${:.6} has no sell target",
            snapshot.token,
            levels[levels.len() - 1]
        );

        grid.capital_allocated += reservation;
        grid.tokens.insert(
            snapshot.mint.clone(),
            GridTokenState {
                mint: snapshot.mint.clone(),
                token: snapshot.token.clone(),
                base_price: snapshot.price,
                grid_levels: levels,
                filled_buys: Vec::new(),
                last_price: Some(snapshot.price),
                active: true,
                reserved_usdc: reservation,
            },
        );
        info!(
            "grid activated for {} @ ${:.6} (${:.2} reserved)",
            snapshot.token, snapshot.price, reservation
        );
        Ok(())
    }

    /// Plan trades for one token at the current price. Pure: applies
    /// nothing, so a failed execution simply drops the action.
    ///
    /// Buys trigger on a downward cross: the previous observed price was
    /// above the level and the current price is at or below it (with a
    /// small tolerance). Sells trigger whenever a fill's sell level is
    /// at or below the current price. Inactive grids only sell.
    pub fn check(&self, state: &GridTokenState, price: f64) -> Vec<GridAction> {
        let mut actions = Vec::new();

        if state.active {
            if let Some(prev) = state.last_price {
                let mut planned = 0usize;
                for &level in &state.grid_levels {
                    if prev > level && price <= level * BUY_CROSS_TOLERANCE {
                        if self.level_occupied(state, level) {
                            continue;
                        }
                        let needed = self.config.capital_per_level * (planned + 1) as f64;
                        if state.reserved_usdc < needed {
                            break;
                        }
                        planned += 1;
                        actions.push(GridAction::Buy {
                            mint: state.mint.clone(),
                            level,
                            usdc_amount: self.config.capital_per_level,
                        });
                    }
                }
            }
        }

        for fill in &state.filled_buys {
            if let Some(sell_level) = fill.sell_level {
                if sell_level <= price {
                    actions.push(GridAction::Sell {
                        mint: state.mint.clone(),
                        fill_id: fill.id,
                        amount: fill.amount,
                        sell_level,
                    });
                }
            }
        }

        actions
    }

    fn level_occupied(&self, state: &GridTokenState, level: f64) -> bool {
        state.filled_buys.iter().any(|f| {
            (f.level - level).abs() / level * 100.0 < LEVEL_DEDUPE_PCT
        })
    }

    /// Next grid level strictly above `level`, if any.
    fn sell_level_above(levels: &[f64], level: f64) -> Option<f64> {
        levels.iter().copied().find(|&l| l > level)
    }

    /// Record an executed buy: converts reservation into a live fill.
    pub fn apply_buy(
        &self,
        grid: &mut GridPortfolio,
        mint: &str,
        level: f64,
        amount: f64,
        usdc_spent: f64,
        now: u64,
    ) -> Result<u64, GridError> {
        let id = grid.next_fill_id();
        let state = grid
            .tokens
            .get_mut(mint)
            .ok_or_else(|| GridError::TokenNotFound(mint.to_string()))?;

        let sell_level = Self::sell_level_above(&state.grid_levels, level);
        if sell_level.is_none() {
            warn!(
                "grid {}: fill at top level ${:.6} cannot be sold by the grid",
                state.token, level
            );
        }
        state.reserved_usdc = (state.reserved_usdc - usdc_spent).max(0.0);
        state.filled_buys.push(FilledBuy {
            id,
            level,
            sell_level,
            amount,
            usdc_spent,
            bought_at: now,
        });
        info!(
            "grid {} bought ${:.2} @ level ${:.6} (fill {})",
            state.token, usdc_spent, level, id
        );
        Ok(id)
    }

    /// Record an executed sell of one fill. Realizes PnL and, on an
    /// active grid, re-reserves the freed capital so the level can fill
    /// again; on an inactive grid the capital is released instead.
    pub fn apply_sell(
        &self,
        grid: &mut GridPortfolio,
        mint: &str,
        fill_id: u64,
        usdc_received: f64,
    ) -> Result<f64, GridError> {
        let state = grid
            .tokens
            .get_mut(mint)
            .ok_or_else(|| GridError::TokenNotFound(mint.to_string()))?;
        let idx = state
            .filled_buys
            .iter()
            .position(|f| f.id == fill_id)
            .ok_or_else(|| GridError::TokenNotFound(format!("{} fill {}", mint, fill_id)))?;

        let fill = state.filled_buys.remove(idx);
        let pnl = usdc_received - fill.usdc_spent;
        grid.total_pnl += pnl;
        grid.total_trades += 1;

        let state = grid
            .tokens
            .get_mut(mint)
            .ok_or_else(|| GridError::TokenNotFound(mint.to_string()))?;
        if state.active {
            state.reserved_usdc += fill.usdc_spent;
        } else {
            grid.capital_allocated = (grid.capital_allocated - fill.usdc_spent).max(0.0);
            if state.filled_buys.is_empty() {
                let token = state.token.clone();
                let reserved = state.reserved_usdc;
                grid.capital_allocated = (grid.capital_allocated - reserved).max(0.0);
                grid.tokens.remove(mint);
                info!("grid {} fully unwound and removed", token);
            }
        }

        info!(
            "grid {} sold fill {} for ${:.2} (pnl ${:+.2})",
            mint, fill_id, usdc_received, pnl
        );
        Ok(pnl)
    }

    /// Update the last observed price after acting on it.
    pub fn mark_price(&self, grid: &mut GridPortfolio, mint: &str, price: f64) {
        if let Some(state) = grid.tokens.get_mut(mint) {
            state.last_price = Some(price);
        }
    }

    /// Stop buying on a token. Unfilled reservation is released; live
    /// fills stay so the grid can still sell them out.
    pub fn deactivate(&self, grid: &mut GridPortfolio, mint: &str) -> Result<(), GridError> {
        let state = grid
            .tokens
            .get_mut(mint)
            .ok_or_else(|| GridError::TokenNotFound(mint.to_string()))?;
        if !state.active {
            return Ok(());
        }
        state.active = false;
        let released = state.reserved_usdc;
        state.reserved_usdc = 0.0;
        grid.capital_allocated = (grid.capital_allocated - released).max(0.0);

        let state = &grid.tokens[mint];
        if state.filled_buys.is_empty() {
            grid.tokens.remove(mint);
        }
        info!("grid {} deactivated (${:.2} released)", mint, released);
        Ok(())
    }
}
