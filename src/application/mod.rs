//! Application layer: wires the domain, strategies and adapters into
//! the periodic trading loop.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
