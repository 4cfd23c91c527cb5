//! Domain layer: portfolio state, risk gating, grid engine, alerts and
//! persistence. Pure trading logic with no knowledge of HTTP or venues.

pub mod alerts;
pub mod grid;
pub mod persistence;
pub mod portfolio;
pub mod risk;
pub mod short_pnl;

pub use alerts::AlertSink;
pub use grid::{GridAction, GridConfig, GridEngine, GridError, GridPortfolio};
pub use persistence::{load_state, save_state, BotState, PersistError};
pub use portfolio::{
    CloseReason, ClosedTrade, OpenPosition, PortfolioError, PortfolioSnapshot, PortfolioState,
    PortfolioStore, Position, ShortPosition, Side, MIN_TRADE_USDC,
};
pub use risk::{DenyReason, GateDecision, RiskConfig, RiskManager, SlTp};
pub use short_pnl::{short_pnl, ShortPnl};
