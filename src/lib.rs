//! Riptide - momentum and mean-reversion trading engine
//!
//! Scans a DEX aggregator for candidates, scores them under two
//! competing strategies, manages position lifecycle with hard risk
//! limits and a portfolio kill switch, and runs a grid sub-engine on
//! stable liquid tokens. Execution is paper-only: fills are simulated
//! against live quotes.
//!
//! Layering follows hexagonal architecture:
//! - `ports`: trait seams for market data and execution
//! - `adapters`: DexScreener client and the paper venue
//! - `domain`: portfolio, risk, grid, persistence, alerts
//! - `strategy`: scorers, indicators, trend regime
//! - `application`: the orchestrated trading loop
//! - `config`: TOML configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
