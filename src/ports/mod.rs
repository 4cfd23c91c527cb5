//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Market data (candidate discovery, price lookup, reference series)
//! - Spot execution (DEX aggregator buys/sells)
//! - Perpetuals execution (short hedge open/close)

pub mod execution;
pub mod market_data;
pub mod mocks;

pub use execution::{
    BuyFill, CloseShortFill, ExecutionError, ExecutionPort, PerpExecutionPort, SellFill, ShortFill,
};
pub use market_data::{MarketDataError, MarketDataPort, PriceQuote, TokenSnapshot, TxnCounts};
pub use mocks::{MockExecution, MockMarketData};
