//! Market Data Store
//!
//! The single entry point other layers use to record extracted market data.
//! Owns the [`BoundedHistoryStore`] and the [`SubscriptionRegistry`].
//!
//! # Consistency
//!
//! `ingest` takes the history lock for the append and then the registry
//! lock for the activity update. These are two critical sections, so a
//! concurrent reader may see an appended record before the matching
//! subscription counter moves.

use std::collections::HashMap;

use crate::domain::history::BoundedHistoryStore;
use crate::domain::market_data::NormalizedRecord;
use crate::domain::subscription::{
    Instrument, RequestId, Subscription, SubscriptionRegistry, SubscriptionRequestType,
};

/// What one `ingest` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Records appended to history.
    pub appended: usize,
    /// Older records evicted to make room.
    pub evicted: usize,
    /// Whether the request id matched a registered subscription.
    pub tracked: bool,
}

/// Facade over history and subscriptions.
#[derive(Debug, Default)]
pub struct MarketDataStore {
    history: BoundedHistoryStore,
    subscriptions: SubscriptionRegistry,
}

impl MarketDataStore {
    /// Create a store retaining at most `history_capacity` records.
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: BoundedHistoryStore::new(history_capacity),
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// Record one extracted batch: append to history, then update the
    /// subscription that produced it (if it is tracked).
    pub fn ingest(
        &self,
        instrument: &str,
        records: Vec<NormalizedRecord>,
        is_snapshot: bool,
        request_id: &str,
    ) -> IngestReport {
        let appended = records.len();
        let evicted = self
            .history
            .append(instrument, records, is_snapshot, request_id);
        let tracked = self
            .subscriptions
            .record_activity(request_id, appended, is_snapshot);

        IngestReport {
            appended,
            evicted,
            tracked,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a live subscription.
    pub fn add_subscription(
        &self,
        instrument: &str,
        request_type: SubscriptionRequestType,
        request_id: &str,
    ) {
        self.subscriptions.add(instrument, request_type, request_id);
    }

    /// Drop one subscription by request id.
    pub fn remove_subscription(&self, request_id: &str) {
        self.subscriptions.remove_by_request_id(request_id);
    }

    /// Drop every subscription for an instrument.
    pub fn remove_by_instrument(&self, instrument: &str) {
        self.subscriptions.remove_by_instrument(instrument);
    }

    /// Copy of one subscription.
    #[must_use]
    pub fn subscription(&self, request_id: &str) -> Option<Subscription> {
        self.subscriptions.get(request_id)
    }

    /// Copy of all subscriptions keyed by request id.
    #[must_use]
    pub fn subscriptions(&self) -> HashMap<RequestId, Subscription> {
        self.subscriptions.snapshot()
    }

    /// Copy of all subscriptions grouped by instrument.
    #[must_use]
    pub fn subscriptions_by_instrument(&self) -> HashMap<Instrument, Vec<Subscription>> {
        self.subscriptions.snapshot_by_instrument()
    }

    /// Request ids currently subscribed to an instrument.
    #[must_use]
    pub fn request_ids_for(&self, instrument: &str) -> Vec<RequestId> {
        self.subscriptions.request_ids_for(instrument)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Up to `limit` most recent records for an instrument, oldest first.
    #[must_use]
    pub fn recent_for(&self, instrument: &str, limit: usize) -> Vec<NormalizedRecord> {
        self.history.recent_for(instrument, limit)
    }

    /// Copy of the full history buffer.
    #[must_use]
    pub fn all_records(&self) -> Vec<NormalizedRecord> {
        self.history.all_records()
    }

    /// Number of records in history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// History capacity.
    #[must_use]
    pub const fn history_capacity(&self) -> usize {
        self.history.capacity()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Utc;

    use super::*;
    use crate::domain::market_data::EntryKind;

    const LIVE: SubscriptionRequestType = SubscriptionRequestType::SnapshotPlusUpdates;

    fn records(kind: &EntryKind, count: usize) -> Vec<NormalizedRecord> {
        (0..count)
            .map(|i| NormalizedRecord {
                instrument: String::new(),
                kind: kind.clone(),
                price: format!("{}.00", 100 + i),
                quantity: "1".to_string(),
                side: None,
                book_position: None,
                event_time: String::new(),
                request_id: String::new(),
                is_snapshot: false,
                sequence_number: "1".to_string(),
                received_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn snapshot_then_incremental_counts_five() {
        let store = MarketDataStore::new(100);
        store.add_subscription("ETH-USD", LIVE, "r1");

        let first = store.ingest("ETH-USD", records(&EntryKind::Bid, 2), true, "r1");
        let second = store.ingest("ETH-USD", records(&EntryKind::Trade, 3), false, "r1");

        assert!(first.tracked && second.tracked);
        let sub = store.subscription("r1").unwrap();
        assert_eq!(sub.total_updates, 5);
        assert!(sub.snapshot_received);
        assert_eq!(store.history_len(), 5);
    }

    #[test]
    fn untracked_snapshot_still_lands_in_history() {
        let store = MarketDataStore::new(100);

        let report = store.ingest("BTC-USD", records(&EntryKind::Trade, 4), true, "md_once");

        assert_eq!(
            report,
            IngestReport {
                appended: 4,
                evicted: 0,
                tracked: false
            }
        );
        assert_eq!(store.recent_for("BTC-USD", 10).len(), 4);
        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn ingest_reports_evictions() {
        let store = MarketDataStore::new(3);

        store.ingest("BTC-USD", records(&EntryKind::Trade, 2), false, "md_1");
        let report = store.ingest("BTC-USD", records(&EntryKind::Trade, 2), false, "md_1");

        assert_eq!(report.evicted, 1);
        assert_eq!(store.history_len(), 3);
        assert_eq!(store.history_capacity(), 3);
    }

    #[test]
    fn empty_batch_still_touches_subscription() {
        let store = MarketDataStore::new(10);
        store.add_subscription("BTC-USD", LIVE, "md_1");

        let report = store.ingest("BTC-USD", Vec::new(), true, "md_1");

        assert_eq!(report.appended, 0);
        assert!(report.tracked);
        let sub = store.subscription("md_1").unwrap();
        assert_eq!(sub.total_updates, 0);
        assert!(sub.snapshot_received);
    }

    #[test]
    fn remove_by_instrument_leaves_history() {
        let store = MarketDataStore::new(10);
        store.add_subscription("BTC-USD", LIVE, "md_1");
        store.add_subscription("ETH-USD", LIVE, "md_2");
        store.ingest("BTC-USD", records(&EntryKind::Trade, 1), false, "md_1");

        store.remove_by_instrument("BTC-USD");

        assert!(store.subscription("md_1").is_none());
        assert!(store.subscription("md_2").is_some());
        assert_eq!(store.request_ids_for("ETH-USD"), vec!["md_2"]);
        assert_eq!(store.all_records().len(), 1);
        assert_eq!(store.subscriptions_by_instrument().len(), 1);
        assert_eq!(store.subscriptions().len(), 1);
    }

    #[test]
    fn remove_subscription_by_id() {
        let store = MarketDataStore::new(10);
        store.add_subscription("BTC-USD", LIVE, "md_1");

        store.remove_subscription("md_1");

        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn concurrent_ingest_and_readers() {
        let store = Arc::new(MarketDataStore::new(1_000));
        store.add_subscription("BTC-USD", LIVE, "md_1");

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.ingest("BTC-USD", records(&EntryKind::Trade, 2), false, "md_1");
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let recent = store.recent_for("BTC-USD", 20);
                    assert!(recent.len() <= 20);
                    let _ = store.subscriptions_by_instrument();
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.subscription("md_1").unwrap().total_updates, 400);
        assert_eq!(store.history_len(), 400);
    }
}
