//! Domain Layer - Core market data types and business logic.
//!
//! This layer contains the normalized record shape, subscription tracking
//! and the bounded history buffer. Nothing here performs I/O.

/// Normalized market data records and batches.
pub mod market_data;

/// Subscription tracking and management.
pub mod subscription;

/// Bounded, insertion-ordered record history.
pub mod history;
