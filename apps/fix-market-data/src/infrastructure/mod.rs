//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the FIX wire handling and the concrete
//! implementations of the port interfaces defined in the application layer.

/// FIX wire constants, message codec, entry extraction and request builder.
pub mod fix;

/// SQLite audit store.
pub mod persistence;

/// Log-line rendering of market data batches.
pub mod display;

/// Session sender adapters.
pub mod session;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
