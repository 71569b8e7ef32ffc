//! Bounded History Store
//!
//! Fixed-capacity buffer of normalized records in arrival order.
//!
//! Capacity is global, not per instrument: when the buffer is full the
//! single oldest record is evicted before each insert, whichever instrument
//! it belongs to. A busy instrument can therefore push a quiet one's history
//! out of the buffer.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::market_data::NormalizedRecord;

/// Default number of records retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Thread-safe FIFO of [`NormalizedRecord`] with oldest-first eviction.
///
/// # Example
///
/// ```rust
/// use fix_market_data::domain::history::BoundedHistoryStore;
///
/// let store = BoundedHistoryStore::new(10);
/// assert_eq!(store.capacity(), 10);
/// assert!(store.recent_for("BTC-USD", 5).is_empty());
/// ```
#[derive(Debug)]
pub struct BoundedHistoryStore {
    capacity: usize,
    records: RwLock<VecDeque<NormalizedRecord>>,
}

impl Default for BoundedHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl BoundedHistoryStore {
    /// Create a store holding at most `capacity` records (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY))),
        }
    }

    /// Maximum number of records retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamp and insert a batch of records, evicting the oldest record
    /// whenever the buffer is full.
    ///
    /// Each record gets `received_at = now` along with the given
    /// instrument, request id and snapshot flag. Returns the number of
    /// records evicted.
    pub fn append(
        &self,
        instrument: &str,
        records: Vec<NormalizedRecord>,
        is_snapshot: bool,
        request_id: &str,
    ) -> usize {
        let now = Utc::now();
        let mut buffer = self.records.write();
        let mut evicted = 0;

        for mut record in records {
            record.received_at = now;
            instrument.clone_into(&mut record.instrument);
            request_id.clone_into(&mut record.request_id);
            record.is_snapshot = is_snapshot;

            if buffer.len() >= self.capacity {
                buffer.pop_front();
                evicted += 1;
            }
            buffer.push_back(record);
        }

        evicted
    }

    /// Up to `limit` most recent records for an instrument, oldest first.
    #[must_use]
    pub fn recent_for(&self, instrument: &str, limit: usize) -> Vec<NormalizedRecord> {
        let buffer = self.records.read();
        let mut recent: Vec<_> = buffer
            .iter()
            .rev()
            .filter(|record| record.instrument == instrument)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Copy of the whole buffer in storage order.
    #[must_use]
    pub fn all_records(&self) -> Vec<NormalizedRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
