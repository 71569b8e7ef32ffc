//! Subscription Registry
//!
//! Tracks live market data subscriptions keyed by request id.
//!
//! # Lifecycle
//!
//! - Created when a snapshot-plus-updates request is issued. One-shot
//!   snapshot requests are never registered.
//! - Mutated on every batch of records tagged with its request id
//!   (update counter, last-update time, snapshot latch).
//! - Removed when unsubscribed by request id or by instrument, or when the
//!   venue rejects the request.
//!
//! Operations on an unknown request id are silent no-ops: there is no way
//! to tell "never existed" apart from "already removed".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

// =============================================================================
// Types
// =============================================================================

/// Caller-generated correlation token for one request.
pub type RequestId = String;

/// An instrument identifier such as `BTC-USD`.
pub type Instrument = String;

/// Subscription request type (wire tag 263).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubscriptionRequestType {
    /// One-shot snapshot.
    SnapshotOnly,
    /// Snapshot followed by incremental updates.
    SnapshotPlusUpdates,
    /// Cancel an earlier subscription.
    Unsubscribe,
}

impl SubscriptionRequestType {
    /// Parse the wire code. Unknown codes return `None`.
    #[must_use]
    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "0" => Some(Self::SnapshotOnly),
            "1" => Some(Self::SnapshotPlusUpdates),
            "2" => Some(Self::Unsubscribe),
            _ => None,
        }
    }

    /// Get the wire code.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::SnapshotOnly => "0",
            Self::SnapshotPlusUpdates => "1",
            Self::Unsubscribe => "2",
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::SnapshotOnly => "Snapshot Only",
            Self::SnapshotPlusUpdates => "Snapshot + Updates",
            Self::Unsubscribe => "Unsubscribe",
        }
    }
}

/// One outstanding live request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    /// Unique key.
    pub request_id: RequestId,
    /// Subscribed instrument.
    pub instrument: Instrument,
    /// Request type the subscription was opened with.
    pub request_type: SubscriptionRequestType,
    /// Whether the subscription is live.
    pub active: bool,
    /// Records received so far (monotonic).
    pub total_updates: u64,
    /// Time of the last recorded activity, or of creation.
    pub last_update_at: DateTime<Utc>,
    /// Latched once any snapshot record arrived.
    pub snapshot_received: bool,
}

impl Subscription {
    fn new(instrument: Instrument, request_type: SubscriptionRequestType, request_id: RequestId) -> Self {
        Self {
            request_id,
            instrument,
            request_type,
            active: true,
            total_updates: 0,
            last_update_at: Utc::now(),
            snapshot_received: false,
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Thread-safe map of request id to [`Subscription`].
///
/// Every read returns value copies so callers never hold the lock while
/// they work with the result.
///
/// # Example
///
/// ```rust
/// use fix_market_data::domain::subscription::{SubscriptionRegistry, SubscriptionRequestType};
///
/// let registry = SubscriptionRegistry::new();
/// registry.add("ETH-USD", SubscriptionRequestType::SnapshotPlusUpdates, "r1");
///
/// registry.record_activity("r1", 2, true);
/// registry.record_activity("r1", 3, false);
///
/// let sub = registry.get("r1").unwrap();
/// assert_eq!(sub.total_updates, 5);
/// assert!(sub.snapshot_received);
///
/// // Unknown ids are ignored.
/// assert!(!registry.record_activity("nope", 10, true));
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<RequestId, Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active subscription.
    ///
    /// Request ids are caller-generated and assumed unique; a duplicate id
    /// replaces the earlier entry.
    pub fn add(
        &self,
        instrument: impl Into<Instrument>,
        request_type: SubscriptionRequestType,
        request_id: impl Into<RequestId>,
    ) {
        let request_id = request_id.into();
        let subscription = Subscription::new(instrument.into(), request_type, request_id.clone());
        self.subscriptions.write().insert(request_id, subscription);
    }

    /// Remove one subscription. No-op when absent.
    pub fn remove_by_request_id(&self, request_id: &str) {
        self.subscriptions.write().remove(request_id);
    }

    /// Remove every subscription for an instrument.
    pub fn remove_by_instrument(&self, instrument: &str) {
        self.subscriptions
            .write()
            .retain(|_, sub| sub.instrument != instrument);
    }

    /// Record a batch of records for a subscription.
    ///
    /// Returns `false`, changing nothing, when the request id is not
    /// registered (one-shot snapshot traffic lands here).
    pub fn record_activity(&self, request_id: &str, record_count: usize, is_snapshot: bool) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(sub) = subscriptions.get_mut(request_id) else {
            return false;
        };

        sub.total_updates = sub.total_updates.saturating_add(record_count as u64);
        sub.last_update_at = Utc::now();
        if is_snapshot {
            sub.snapshot_received = true;
        }
        true
    }

    /// Copy of one subscription.
    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<Subscription> {
        self.subscriptions.read().get(request_id).cloned()
    }

    /// Copy of every subscription, keyed by request id.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<RequestId, Subscription> {
        self.subscriptions.read().clone()
    }

    /// Copy of every subscription grouped by instrument. Each group is
    /// ordered by request id.
    #[must_use]
    pub fn snapshot_by_instrument(&self) -> HashMap<Instrument, Vec<Subscription>> {
        let mut grouped: HashMap<Instrument, Vec<Subscription>> = HashMap::new();
        for sub in self.subscriptions.read().values() {
            grouped
                .entry(sub.instrument.clone())
                .or_default()
                .push(sub.clone());
        }
        for subs in grouped.values_mut() {
            subs.sort_by(|a, b| a.request_id.cmp(&b.request_id));
        }
        grouped
    }

    /// Request ids subscribed to an instrument, in request id order.
    #[must_use]
    pub fn request_ids_for(&self, instrument: &str) -> Vec<RequestId> {
        let mut ids: Vec<_> = self
            .subscriptions
            .read()
            .values()
            .filter(|sub| sub.instrument == instrument)
            .map(|sub| sub.request_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
