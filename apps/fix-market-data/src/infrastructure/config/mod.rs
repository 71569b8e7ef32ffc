//! Configuration Module
//!
//! Configuration loading for the market data client.

mod settings;

pub use settings::{ClientConfig, ConfigError, ServerSettings, SessionSettings, StoreSettings};
