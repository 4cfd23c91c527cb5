//! Configuration loading and validation.

pub mod loader;

pub use loader::{load_config, Config, ConfigError, DEFAULT_CONFIG_PATH};
