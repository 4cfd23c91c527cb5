//! State persistence
//!
//! The full portfolio state (including the nested grid portfolio) is one
//! JSON document, rewritten synchronously after every mutating
//! operation. On startup the document is loaded verbatim; an absent or
//! corrupt file yields a fresh default rather than an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

use super::grid::GridPortfolio;
use super::portfolio::PortfolioState;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to create state directory: {0}")]
    Directory(String),

    #[error("Failed to serialize state: {0}")]
    Serialize(String),

    #[error("Failed to write state file: {0}")]
    Write(String),
}

/// The single persisted document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub portfolio: PortfolioState,
    pub grid: GridPortfolio,
    /// Unix seconds of the last save
    pub saved_at: u64,
}

impl BotState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            portfolio: PortfolioState::new(initial_capital),
            grid: GridPortfolio::default(),
            saved_at: 0,
        }
    }
}

/// Load persisted state, falling back to a fresh default when the file
/// is absent or unreadable. Corrupt input is treated as absent.
pub fn load_state(path: &Path, initial_capital: f64) -> BotState {
    if !path.exists() {
        info!("no state file at {}, starting fresh", path.display());
        return BotState::new(initial_capital);
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "could not read state file {} ({}), starting fresh",
                path.display(),
                e
            );
            return BotState::new(initial_capital);
        }
    };

    match serde_json::from_str::<BotState>(&content) {
        Ok(state) => {
            info!(
                "state loaded: ${:.2} capital, {} open, {} closed",
                state.portfolio.capital_usdc,
                state.portfolio.positions.len(),
                state.portfolio.closed_trades.len()
            );
            state
        }
        Err(e) => {
            warn!(
                "state file {} is corrupt ({}), starting fresh",
                path.display(),
                e
            );
            BotState::new(initial_capital)
        }
    }
}

/// Write the state document synchronously.
pub fn save_state(path: &Path, state: &BotState) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::Directory(e.to_string()))?;
    }

    let mut stamped = state.clone();
    stamped.saved_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let content = serde_json::to_string_pretty(&stamped)
        .map_err(|e| PersistError::Serialize(e.to_string()))?;
    fs::write(path, content).map_err(|e| PersistError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_load_absent_file_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let state = load_state(&path, 250.0);
        assert_relative_eq!(state.portfolio.capital_usdc, 250.0);
        assert!(state.portfolio.positions.is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/state.json");

        let mut state = BotState::new(100.0);
        state.portfolio.total_pnl = -6.75;
        state.portfolio.kill_switch_triggered = true;
        save_state(&path, &state).unwrap();

        let loaded = load_state(&path, 100.0);
        assert_relative_eq!(loaded.portfolio.total_pnl, -6.75);
        assert!(loaded.portfolio.kill_switch_triggered);
        assert!(loaded.saved_at > 0);
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json ]").unwrap();

        let state = load_state(&path, 100.0);
        assert_relative_eq!(state.portfolio.capital_usdc, 100.0);
        assert_eq!(state.portfolio.trade_count, 0);
    }
}
