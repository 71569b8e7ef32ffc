//! Market Data Client Service
//!
//! Application-level handling of the market data session: routes inbound
//! snapshot, incremental and reject messages into the [`MarketDataStore`]
//! and its collaborators, and issues subscribe / unsubscribe requests.
//!
//! # Inbound Flow
//!
//! ```text
//! W / X ──► MessageExtractor ──► MarketDataStore::ingest
//!                                   ├──► AuditSink::store_batch   (optional)
//!                                   └──► MarketDataView
//! Y     ──► log reason ──► drop the rejected request id
//! ```
//!
//! Audit failures are logged and never stop the batch from reaching the
//! history or the view.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use super::store::{IngestReport, MarketDataStore};
use crate::application::ports::{
    AuditSink, MarketDataView, OrderSender, SessionRecord, TransportError,
};
use crate::domain::market_data::EntryKind;
use crate::domain::subscription::{RequestId, SubscriptionRequestType};
use crate::infrastructure::fix::tags::{
    MSG_TYPE_MARKET_DATA_INCREMENTAL, MSG_TYPE_MARKET_DATA_REJECT, MSG_TYPE_MARKET_DATA_SNAPSHOT,
    TAG_MD_REQ_ID, TAG_MD_REQ_REJ_REASON, TAG_TEXT, reject_reason_description, reject_reason_hint,
};
use crate::infrastructure::fix::{
    FixMessage, MarketDataRequest, MessageExtractor, SessionIdentity, is_request_id,
};
use crate::infrastructure::metrics::{self, MessageKind};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session could not send the request.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No live subscription carries this request id.
    #[error("no active subscription with request id {0}")]
    UnknownRequest(String),
}

/// What happened to one inbound application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A snapshot or incremental batch was recorded.
    MarketData {
        /// Full refresh rather than incremental.
        is_snapshot: bool,
        /// Result of the store update.
        report: IngestReport,
    },
    /// The venue rejected a request.
    Rejected {
        /// Rejected request id.
        request_id: String,
        /// Reject reason code (tag 281), empty when absent.
        reason: String,
    },
    /// Not a market data message.
    Ignored {
        /// Message type, empty when absent.
        msg_type: String,
    },
}

/// Market data client.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct MarketDataClient {
    store: Arc<MarketDataStore>,
    sender: Arc<dyn OrderSender>,
    audit: Option<Arc<dyn AuditSink>>,
    view: Option<Arc<dyn MarketDataView>>,
    extractor: MessageExtractor,
    identity: SessionIdentity,
}

impl std::fmt::Debug for MarketDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataClient")
            .field("identity", &self.identity)
            .field("subscriptions", &self.store.subscription_count())
            .field("history_len", &self.store.history_len())
            .field("audit", &self.audit.is_some())
            .field("view", &self.view.is_some())
            .finish_non_exhaustive()
    }
}

impl MarketDataClient {
    /// Create a client over a store and a session sender.
    #[must_use]
    pub fn new(
        store: Arc<MarketDataStore>,
        sender: Arc<dyn OrderSender>,
        identity: SessionIdentity,
    ) -> Self {
        Self {
            store,
            sender,
            audit: None,
            view: None,
            extractor: MessageExtractor::new(),
            identity,
        }
    }

    /// Persist every batch and issued request to an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Render every batch to a view.
    #[must_use]
    pub fn with_view(mut self, view: Arc<dyn MarketDataView>) -> Self {
        self.view = Some(view);
        self
    }

    /// The shared store.
    #[must_use]
    pub const fn store(&self) -> &Arc<MarketDataStore> {
        &self.store
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handle one inbound application message.
    pub fn on_message(&self, message: &FixMessage) -> InboundOutcome {
        match message.msg_type() {
            Some(MSG_TYPE_MARKET_DATA_SNAPSHOT) => {
                metrics::record_message_received(MessageKind::Snapshot);
                self.handle_market_data(message)
            }
            Some(MSG_TYPE_MARKET_DATA_INCREMENTAL) => {
                metrics::record_message_received(MessageKind::Incremental);
                self.handle_market_data(message)
            }
            Some(MSG_TYPE_MARKET_DATA_REJECT) => {
                metrics::record_message_received(MessageKind::Reject);
                self.handle_reject(message)
            }
            other => {
                metrics::record_message_received(MessageKind::Other);
                let msg_type = other.unwrap_or_default().to_string();
                tracing::debug!(msg_type = %msg_type, "Ignoring non market data message");
                InboundOutcome::Ignored { msg_type }
            }
        }
    }

    fn handle_market_data(&self, message: &FixMessage) -> InboundOutcome {
        let started = Instant::now();
        let batch = self.extractor.extract_message(message);
        metrics::record_extraction_duration(started.elapsed());

        tracing::info!(
            instrument = %batch.instrument,
            request_id = %batch.request_id,
            entries = batch.declared_entries.as_deref().unwrap_or("0"),
            seq = %batch.sequence_number,
            "Market data {}",
            if batch.is_snapshot { "snapshot" } else { "incremental" }
        );

        for record in &batch.records {
            metrics::record_record_extracted(&record.kind);
        }

        let report = self.store.ingest(
            &batch.instrument,
            batch.records.clone(),
            batch.is_snapshot,
            &batch.request_id,
        );
        metrics::record_history_evictions(report.evicted);

        if let Some(audit) = &self.audit
            && !batch.is_empty()
        {
            match audit.store_batch(&batch) {
                Ok(rows) => tracing::debug!(rows, "Stored market data batch"),
                Err(e) => {
                    metrics::record_audit_failure();
                    tracing::error!(
                        error = %e,
                        instrument = %batch.instrument,
                        request_id = %batch.request_id,
                        "Failed to store market data"
                    );
                }
            }
        }

        if let Some(view) = &self.view {
            if batch.is_snapshot {
                view.show_snapshot(&batch);
            } else {
                view.show_incremental(&batch);
            }
        }

        InboundOutcome::MarketData {
            is_snapshot: batch.is_snapshot,
            report,
        }
    }

    fn handle_reject(&self, message: &FixMessage) -> InboundOutcome {
        let request_id = message.get_or_empty(TAG_MD_REQ_ID).to_string();
        let reason = message.get_or_empty(TAG_MD_REQ_REJ_REASON).to_string();

        metrics::record_reject(&reason);
        tracing::warn!(
            request_id = %request_id,
            reason = %reason,
            description = reject_reason_description(&reason),
            text = message.get_or_empty(TAG_TEXT),
            "Market data request rejected"
        );
        if let Some(hint) = reject_reason_hint(&reason) {
            tracing::info!(hint, "Reject hint");
        }

        self.store.remove_subscription(&request_id);
        metrics::set_active_subscriptions(self.store.subscription_count());

        InboundOutcome::Rejected { request_id, reason }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Request a snapshot or a live subscription for one instrument.
    ///
    /// Live subscriptions are registered before sending; if the send fails,
    /// every subscription for the instrument is dropped. An empty
    /// `entry_kinds` requests trades.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the session cannot send.
    pub async fn request(
        &self,
        instrument: &str,
        request_type: SubscriptionRequestType,
        depth: u32,
        entry_kinds: Vec<EntryKind>,
    ) -> Result<RequestId, ClientError> {
        let entry_kinds = if entry_kinds.is_empty() {
            vec![EntryKind::Trade]
        } else {
            entry_kinds
        };
        let request = MarketDataRequest::new(instrument, request_type, depth, entry_kinds);
        let request_id = request.request_id.clone();

        if request_type == SubscriptionRequestType::SnapshotPlusUpdates {
            self.store
                .add_subscription(instrument, request_type, &request_id);
        }
        self.record_session(&request);

        let message = request.to_message(&self.identity, Utc::now());
        if let Err(e) = self.sender.send(message).await {
            metrics::record_request_failed(request_type);
            self.store.remove_by_instrument(instrument);
            metrics::set_active_subscriptions(self.store.subscription_count());
            tracing::error!(
                error = %e,
                instrument,
                request_id = %request_id,
                "Failed to send market data request"
            );
            return Err(e.into());
        }

        metrics::record_request_sent(request_type);
        metrics::set_active_subscriptions(self.store.subscription_count());
        tracing::info!(
            instrument,
            request_id = %request_id,
            request_type = request_type.description(),
            depth,
            "Sent market data request"
        );
        Ok(request_id)
    }

    /// Cancel one live subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownRequest`] if the id is not tracked, or
    /// [`ClientError::Transport`] if the session cannot send. The
    /// subscription is kept on send failure.
    pub async fn unsubscribe_request(&self, request_id: &str) -> Result<(), ClientError> {
        let subscription = self
            .store
            .subscription(request_id)
            .ok_or_else(|| ClientError::UnknownRequest(request_id.to_string()))?;

        self.send_unsubscribe(request_id, &subscription.instrument)
            .await?;
        self.store.remove_subscription(request_id);
        metrics::set_active_subscriptions(self.store.subscription_count());
        Ok(())
    }

    /// Cancel every live subscription for an instrument.
    ///
    /// Returns the ids that were cancelled. Ids whose cancel fails to send
    /// are logged and stay registered.
    pub async fn unsubscribe_instrument(&self, instrument: &str) -> Vec<RequestId> {
        let request_ids = self.store.request_ids_for(instrument);
        if request_ids.is_empty() {
            tracing::info!(instrument, "No active subscriptions");
            return Vec::new();
        }

        let mut cancelled = Vec::with_capacity(request_ids.len());
        for request_id in request_ids {
            match self.send_unsubscribe(&request_id, instrument).await {
                Ok(()) => {
                    self.store.remove_subscription(&request_id);
                    cancelled.push(request_id);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        instrument,
                        request_id = %request_id,
                        "Failed to unsubscribe"
                    );
                }
            }
        }
        metrics::set_active_subscriptions(self.store.subscription_count());
        cancelled
    }

    /// Cancel by request id when `target` looks like one, otherwise by instrument.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::unsubscribe_request`] errors for request ids.
    pub async fn unsubscribe(&self, target: &str) -> Result<Vec<RequestId>, ClientError> {
        if is_request_id(target) {
            self.unsubscribe_request(target).await?;
            Ok(vec![target.to_string()])
        } else {
            Ok(self.unsubscribe_instrument(target).await)
        }
    }

    /// Log every live subscription, grouped by instrument.
    pub fn log_status(&self) {
        let by_instrument = self.store.subscriptions_by_instrument();
        if by_instrument.is_empty() {
            tracing::info!("No active subscriptions");
            return;
        }

        let mut instruments: Vec<_> = by_instrument.keys().cloned().collect();
        instruments.sort();
        for instrument in instruments {
            for sub in &by_instrument[&instrument] {
                tracing::info!(
                    instrument = %instrument,
                    request_id = %sub.request_id,
                    request_type = sub.request_type.description(),
                    active = sub.active,
                    updates = sub.total_updates,
                    snapshot_received = sub.snapshot_received,
                    last_update = %sub.last_update_at,
                    "Subscription status"
                );
            }
        }
    }

    async fn send_unsubscribe(&self, request_id: &str, instrument: &str) -> Result<(), ClientError> {
        let request = MarketDataRequest::unsubscribe(request_id, instrument);
        let message = request.to_message(&self.identity, Utc::now());
        if let Err(e) = self.sender.send(message).await {
            metrics::record_request_failed(SubscriptionRequestType::Unsubscribe);
            return Err(e.into());
        }
        metrics::record_request_sent(SubscriptionRequestType::Unsubscribe);
        tracing::info!(instrument, request_id, "Sent unsubscribe request");
        Ok(())
    }

    fn record_session(&self, request: &MarketDataRequest) {
        let Some(audit) = &self.audit else {
            return;
        };
        let label = match request.request_type {
            SubscriptionRequestType::SnapshotPlusUpdates => "subscribe",
            SubscriptionRequestType::SnapshotOnly | SubscriptionRequestType::Unsubscribe => {
                "snapshot"
            }
        };
        let session = SessionRecord {
            session_id: format!("{}_{label}_{}", request.instrument, Utc::now().timestamp()),
            instrument: request.instrument.clone(),
            request_type: label.to_string(),
            data_types: request.data_category().unwrap_or_default().to_string(),
            depth: request.recorded_depth(),
            request_id: request.request_id.clone(),
        };
        if let Err(e) = audit.record_session(&session) {
            tracing::warn!(error = %e, session_id = %session.session_id, "Failed to record session");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
