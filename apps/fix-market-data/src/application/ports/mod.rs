//! Port Interfaces
//!
//! Contracts between the market data client and the collaborators it does
//! not own, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `OrderSender`: hands outbound messages to the FIX session engine
//! - `AuditSink`: durable batch storage of extracted records
//! - `MarketDataView`: human-facing rendering of each batch

use async_trait::async_trait;

use crate::domain::market_data::MarketDataBatch;
use crate::infrastructure::fix::FixMessage;

// =============================================================================
// Transport
// =============================================================================

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The session engine refused or failed to send.
    #[error("send failed: {message}")]
    SendFailed {
        /// Error details.
        message: String,
    },
}

/// Port for sending application messages over the FIX session.
#[async_trait]
pub trait OrderSender: Send + Sync {
    /// Queue one message for sending.
    async fn send(&self, message: FixMessage) -> Result<(), TransportError>;
}

// =============================================================================
// Audit
// =============================================================================

/// Audit storage errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// The store could not be opened or initialized.
    #[error("audit store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A record insert failed; the batch was rolled back.
    #[error("failed to store {kind} data: {message}")]
    Store {
        /// Entry kind of the offending record.
        kind: String,
        /// Error details.
        message: String,
    },

    /// Transaction begin or commit failed.
    #[error("audit transaction failed: {message}")]
    Transaction {
        /// Error details.
        message: String,
    },

    /// A session row could not be written.
    #[error("failed to create session record: {message}")]
    Session {
        /// Error details.
        message: String,
    },
}

/// One issued request, as recorded in the audit store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Unique row key (`<instrument>_<request type>_<unix seconds>`).
    pub session_id: String,
    /// Requested instrument.
    pub instrument: String,
    /// `snapshot` or `subscribe`.
    pub request_type: String,
    /// `order_book`, `trades` or `ohlcv`; empty when no kind was recognized.
    pub data_types: String,
    /// Book depth, only for book requests with non-zero depth.
    pub depth: Option<u32>,
    /// Request id of the request.
    pub request_id: String,
}

/// Port for durable storage of extracted market data.
///
/// `store_batch` is all-or-nothing: the first failing record aborts the
/// batch and nothing from it is kept. Callers log and move on; there is no
/// retry.
pub trait AuditSink: Send + Sync {
    /// Store every record of one message. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error naming the failing record's kind; the batch is rolled back.
    fn store_batch(&self, batch: &MarketDataBatch) -> Result<usize, AuditError>;

    /// Record an issued request.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn record_session(&self, session: &SessionRecord) -> Result<(), AuditError>;
}

// =============================================================================
// Display
// =============================================================================

/// Port for rendering batches to an operator.
pub trait MarketDataView: Send + Sync {
    /// Render a full-refresh batch.
    fn show_snapshot(&self, batch: &MarketDataBatch);

    /// Render an incremental batch.
    fn show_incremental(&self, batch: &MarketDataBatch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = AuditError::Store {
            kind: "Trade".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "failed to store Trade data: disk full");

        let err = TransportError::SendFailed {
            message: "session closed".to_string(),
        };
        assert_eq!(err.to_string(), "send failed: session closed");
    }
}
