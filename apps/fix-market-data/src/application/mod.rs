//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the session engine, the
//! audit store and the operator display.

/// Port interfaces for external systems (session, audit, display).
pub mod ports;

/// Application services for market data ingestion and requests.
pub mod services;
