//! Execution ports
//!
//! Trait abstractions over the swap venue (spot buys/sells routed through
//! a DEX aggregator) and the perpetuals protocol used for short hedges.
//! An execution failure always means "skip this trade", never "abort the
//! cycle" - callers log it and move on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution error type
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No price available for {0}")]
    NoPrice(String),

    #[error("Insufficient balance: have {have:.2}, need {need:.2}")]
    InsufficientBalance { have: f64, need: f64 },
}

/// Result of a successful spot buy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyFill {
    /// Tokens received
    pub output_amount: f64,
    /// Effective fill price in USDC per token
    pub price: f64,
    /// Venue transaction id
    pub tx_id: String,
    /// True when the fill was simulated rather than submitted on-chain
    pub simulated: bool,
}

/// Result of a successful spot sell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellFill {
    /// USDC proceeds
    pub usdc_received: f64,
    pub tx_id: String,
    pub simulated: bool,
}

/// Result of a successful short open on the perps venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortFill {
    /// Venue position id
    pub position_id: String,
    /// Entry price of the short
    pub entry_price: f64,
    /// Base asset amount sold short
    pub base_amount: f64,
    pub simulated: bool,
}

/// Result of a successful short close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseShortFill {
    /// Exit price of the short
    pub exit_price: f64,
    pub tx_id: String,
    pub simulated: bool,
}

/// Spot execution port (DEX aggregator)
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    /// Spend `usdc_amount` USDC buying `mint`.
    async fn buy(&self, mint: &str, usdc_amount: f64) -> Result<BuyFill, ExecutionError>;

    /// Sell `amount` tokens of `mint` back to USDC.
    async fn sell(&self, mint: &str, amount: f64) -> Result<SellFill, ExecutionError>;
}

/// Perpetuals execution port (short hedge)
///
/// Orders are placed against a perp market id ("SOL-PERP") but the
/// underlying mint travels with every call so simulated venues can
/// price the fill from spot quotes.
#[async_trait]
pub trait PerpExecutionPort: Send + Sync {
    /// Open a short of `size_usdc` notional on `market` at the given
    /// leverage.
    async fn open_short(
        &self,
        market: &str,
        mint: &str,
        size_usdc: f64,
        leverage: f64,
    ) -> Result<ShortFill, ExecutionError>;

    /// Close a previously opened short.
    async fn close_short(
        &self,
        market: &str,
        mint: &str,
        base_amount: f64,
    ) -> Result<CloseShortFill, ExecutionError>;
}
