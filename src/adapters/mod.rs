//! Adapters: concrete implementations of the ports against real or
//! simulated venues.

pub mod dexscreener;
pub mod paper;

pub use dexscreener::DexScreenerClient;
pub use paper::PaperExecution;
