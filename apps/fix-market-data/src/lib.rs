#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! FIX Market Data Client
//!
//! Client-side core for a FIX market data session: turns snapshot and
//! incremental refresh messages into normalized records, tracks live
//! subscriptions, and keeps a bounded history of recent records.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core market data types
//!   - `market_data`: Normalized records, entry kinds, batches
//!   - `subscription`: Subscription tracking and management
//!   - `history`: Bounded FIFO record buffer
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Session sender, audit sink, display
//!   - `services`: Store facade, market data client
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `fix`: Wire constants, message codec, entry extraction, requests
//!   - `persistence`: SQLite audit store
//!   - `display`: Log-line rendering
//!   - `session`: Dry-run sender
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! FIX session ──► MarketDataClient::on_message
//!                      │
//!                      ├─ W / X ──► MessageExtractor ──► MarketDataStore
//!                      │                                   ├─► history
//!                      │                                   └─► subscriptions
//!                      │                 ├──► AuditSink (SQLite)
//!                      │                 └──► MarketDataView (log)
//!                      └─ Y ─────► drop rejected subscription
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::history::{BoundedHistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use domain::market_data::{AggressorSide, EntryKind, MarketDataBatch, NormalizedRecord};
pub use domain::subscription::{
    Instrument, RequestId, Subscription, SubscriptionRegistry, SubscriptionRequestType,
};

// Application
pub use application::ports::{
    AuditError, AuditSink, MarketDataView, OrderSender, SessionRecord, TransportError,
};
pub use application::services::{
    ClientError, InboundOutcome, IngestReport, MarketDataClient, MarketDataStore,
};

// FIX wire handling
pub use infrastructure::fix::{
    EntryBoundaryScanner, EntryContext, EntryNormalizer, FixMessage, FixParseError,
    MarketDataRequest, MessageExtractor, SessionIdentity,
};

// Adapters
pub use infrastructure::display::LogDisplay;
pub use infrastructure::persistence::{AuditCounts, SqliteAuditStore};
pub use infrastructure::session::DryRunSender;

// Infrastructure config
pub use infrastructure::config::{
    ClientConfig, ConfigError, ServerSettings, SessionSettings, StoreSettings,
};

// Metrics
pub use infrastructure::metrics::{MessageKind as MetricsMessageKind, MetricsError, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
