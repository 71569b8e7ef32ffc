//! Prometheus Metrics Module
//!
//! Exposes client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Messages**: inbound application messages by type
//! - **Records**: extracted entries by kind, history evictions
//! - **Requests**: outbound requests and venue rejects
//! - **Audit**: failed persistence batches
//! - **Latency**: extraction time per message
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

use crate::domain::market_data::EntryKind;
use crate::domain::subscription::SubscriptionRequestType;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics initialization errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The `/metrics` listener could not bind its port.
    #[error("failed to bind metrics listener on port {0}: {1}")]
    Bind(u16, String),

    /// The recorder could not be built or installed globally.
    #[error("failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Initialize the Prometheus metrics recorder.
///
/// With a non-zero `listen_port` the exporter also serves `/metrics` over
/// HTTP on that port; this must be called from inside a Tokio runtime.
/// Later calls return the handle installed by the first successful one.
///
/// # Errors
///
/// Returns `MetricsError::Bind` if the listener port is unavailable and
/// `MetricsError::Install` if the recorder cannot be installed.
pub fn init_metrics(listen_port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let builder = PrometheusBuilder::new();
    let handle = if listen_port == 0 {
        builder
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?
    } else {
        let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
        let (recorder, exporter) = builder
            .with_http_listener(addr)
            .build()
            .map_err(|e| MetricsError::Bind(listen_port, e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Prometheus exporter stopped");
            }
        });
        tracing::info!(%addr, "Prometheus exporter listening");
        handle
    };

    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "fix_md_messages_received_total",
        "Inbound application messages by FIX message type"
    );
    describe_counter!(
        "fix_md_records_extracted_total",
        "Market data entries extracted by entry kind"
    );
    describe_counter!(
        "fix_md_history_evictions_total",
        "Records evicted from the bounded history buffer"
    );
    describe_counter!(
        "fix_md_requests_sent_total",
        "Market data requests sent by subscription request type"
    );
    describe_counter!(
        "fix_md_request_failures_total",
        "Market data requests the session failed to send"
    );
    describe_counter!(
        "fix_md_rejects_total",
        "Market data request rejects by reason code"
    );
    describe_counter!(
        "fix_md_audit_failures_total",
        "Audit batches abandoned after a storage error"
    );

    describe_gauge!(
        "fix_md_active_subscriptions",
        "Live subscriptions currently tracked"
    );

    describe_histogram!(
        "fix_md_extraction_seconds",
        "Time to extract entries from one market data message"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Snapshot / full refresh (`W`).
    Snapshot,
    /// Incremental refresh (`X`).
    Incremental,
    /// Request reject (`Y`).
    Reject,
    /// Anything else.
    Other,
}

impl MessageKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Incremental => "incremental",
            Self::Reject => "reject",
            Self::Other => "other",
        }
    }
}

fn entry_kind_label(kind: &EntryKind) -> &'static str {
    match kind {
        EntryKind::Bid => "bid",
        EntryKind::Offer => "offer",
        EntryKind::Trade => "trade",
        EntryKind::Open => "open",
        EntryKind::Close => "close",
        EntryKind::High => "high",
        EntryKind::Low => "low",
        EntryKind::Volume => "volume",
        EntryKind::Other(_) => "other",
    }
}

/// Reject reason codes 0-8 pass through; anything else is `other`.
fn reject_reason_label(code: &str) -> &'static str {
    match code {
        "0" => "0",
        "1" => "1",
        "2" => "2",
        "3" => "3",
        "4" => "4",
        "5" => "5",
        "6" => "6",
        "7" => "7",
        "8" => "8",
        _ => "other",
    }
}

const fn request_type_label(request_type: SubscriptionRequestType) -> &'static str {
    match request_type {
        SubscriptionRequestType::SnapshotOnly => "snapshot",
        SubscriptionRequestType::SnapshotPlusUpdates => "subscribe",
        SubscriptionRequestType::Unsubscribe => "unsubscribe",
    }
}

/// Record an inbound application message.
pub fn record_message_received(kind: MessageKind) {
    counter!(
        "fix_md_messages_received_total",
        "message_type" => kind.as_str()
    )
    .increment(1);
}

/// Record one extracted entry.
pub fn record_record_extracted(kind: &EntryKind) {
    counter!(
        "fix_md_records_extracted_total",
        "entry_kind" => entry_kind_label(kind)
    )
    .increment(1);
}

/// Record history evictions.
pub fn record_history_evictions(count: usize) {
    if count > 0 {
        counter!("fix_md_history_evictions_total").increment(count as u64);
    }
}

/// Record a request handed to the session.
pub fn record_request_sent(request_type: SubscriptionRequestType) {
    counter!(
        "fix_md_requests_sent_total",
        "request_type" => request_type_label(request_type)
    )
    .increment(1);
}

/// Record a request the session failed to send.
pub fn record_request_failed(request_type: SubscriptionRequestType) {
    counter!(
        "fix_md_request_failures_total",
        "request_type" => request_type_label(request_type)
    )
    .increment(1);
}

/// Record a venue reject.
pub fn record_reject(reason_code: &str) {
    counter!(
        "fix_md_rejects_total",
        "reason" => reject_reason_label(reason_code)
    )
    .increment(1);
}

/// Record an abandoned audit batch.
pub fn record_audit_failure() {
    counter!("fix_md_audit_failures_total").increment(1);
}

/// Update the live subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("fix_md_active_subscriptions").set(count as f64);
}

/// Record extraction time for one message.
pub fn record_extraction_duration(duration: Duration) {
    histogram!("fix_md_extraction_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
