//! Market Data Request Builder
//!
//! Builds outbound `MarketDataRequest` (35=V) messages for snapshots,
//! subscriptions and unsubscribes.

use chrono::{DateTime, Utc};

use super::message::FixMessage;
use super::tags::{
    FIX_BEGIN_STRING, FIX_TIME_FORMAT, MD_UPDATE_TYPE_INCREMENTAL, MSG_TYPE_MARKET_DATA_REQUEST,
    TAG_BEGIN_STRING, TAG_MARKET_DEPTH, TAG_MD_ENTRY_TYPE, TAG_MD_REQ_ID, TAG_MD_UPDATE_TYPE,
    TAG_MSG_TYPE, TAG_NO_MD_ENTRY_TYPES, TAG_NO_RELATED_SYM, TAG_SENDER_COMP_ID,
    TAG_SENDING_TIME, TAG_SUBSCRIPTION_REQUEST_TYPE, TAG_SYMBOL, TAG_TARGET_COMP_ID,
};
use crate::domain::market_data::EntryKind;
use crate::domain::subscription::SubscriptionRequestType;

/// Prefix of generated request ids.
pub const REQUEST_ID_PREFIX: &str = "md_";

/// Generate a request id from the current time (`md_<unix-nanos>`).
#[must_use]
pub fn new_request_id() -> String {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
    format!("{REQUEST_ID_PREFIX}{nanos}")
}

/// Whether a token looks like a generated request id rather than an instrument.
#[must_use]
pub fn is_request_id(token: &str) -> bool {
    token.starts_with(REQUEST_ID_PREFIX)
}

/// Session identity stamped into every outbound header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// `SenderCompID` (service account id).
    pub sender_comp_id: String,
    /// `TargetCompID`.
    pub target_comp_id: String,
}

/// Parameters of one market data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataRequest {
    /// Correlation id (tag 262).
    pub request_id: String,
    /// Instrument (tag 55 inside `NoRelatedSym`).
    pub instrument: String,
    /// Snapshot, subscribe or unsubscribe (tag 263).
    pub request_type: SubscriptionRequestType,
    /// Book depth (tag 264); 0 is full depth.
    pub depth: u32,
    /// Requested entry kinds (`NoMDEntryTypes` group).
    pub entry_kinds: Vec<EntryKind>,
}

impl MarketDataRequest {
    /// A new request with a freshly generated id.
    #[must_use]
    pub fn new(
        instrument: impl Into<String>,
        request_type: SubscriptionRequestType,
        depth: u32,
        entry_kinds: Vec<EntryKind>,
    ) -> Self {
        Self {
            request_id: new_request_id(),
            instrument: instrument.into(),
            request_type,
            depth,
            entry_kinds,
        }
    }

    /// Cancel an earlier subscription, reusing its request id.
    #[must_use]
    pub fn unsubscribe(request_id: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            instrument: instrument.into(),
            request_type: SubscriptionRequestType::Unsubscribe,
            depth: 0,
            entry_kinds: vec![EntryKind::Trade],
        }
    }

    /// Build the wire message.
    ///
    /// `MDUpdateType=1` is only set for subscriptions.
    #[must_use]
    pub fn to_message(&self, identity: &SessionIdentity, sending_time: DateTime<Utc>) -> FixMessage {
        let mut msg = FixMessage::new();
        msg.push(TAG_BEGIN_STRING, FIX_BEGIN_STRING)
            .push(TAG_MSG_TYPE, MSG_TYPE_MARKET_DATA_REQUEST)
            .push(TAG_SENDER_COMP_ID, identity.sender_comp_id.as_str())
            .push(TAG_TARGET_COMP_ID, identity.target_comp_id.as_str())
            .push(
                TAG_SENDING_TIME,
                sending_time.format(FIX_TIME_FORMAT).to_string(),
            )
            .push(TAG_MD_REQ_ID, self.request_id.as_str())
            .push(TAG_SUBSCRIPTION_REQUEST_TYPE, self.request_type.as_wire())
            .push(TAG_MARKET_DEPTH, self.depth.to_string());

        if self.request_type == SubscriptionRequestType::SnapshotPlusUpdates {
            msg.push(TAG_MD_UPDATE_TYPE, MD_UPDATE_TYPE_INCREMENTAL);
        }

        msg.push(TAG_NO_MD_ENTRY_TYPES, self.entry_kinds.len().to_string());
        for kind in &self.entry_kinds {
            msg.push(TAG_MD_ENTRY_TYPE, kind.as_wire());
        }

        msg.push(TAG_NO_RELATED_SYM, "1")
            .push(TAG_SYMBOL, self.instrument.as_str());
        msg
    }

    /// Category recorded in the audit session row: `order_book`, `trades`
    /// or `ohlcv`, from the first recognized entry kind.
    #[must_use]
    pub fn data_category(&self) -> Option<&'static str> {
        self.entry_kinds.iter().find_map(|kind| {
            if kind.is_book() {
                Some("order_book")
            } else if *kind == EntryKind::Trade {
                Some("trades")
            } else if kind.is_candle() {
                Some("ohlcv")
            } else {
                None
            }
        })
    }

    /// Depth worth recording: only for book requests with a non-zero depth.
    #[must_use]
    pub fn recorded_depth(&self) -> Option<u32> {
        let has_book = self.entry_kinds.iter().any(EntryKind::is_book);
        (has_book && self.depth != 0).then_some(self.depth)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            sender_comp_id: "svc-account".to_string(),
            target_comp_id: "COIN".to_string(),
        }
    }

    fn request(request_type: SubscriptionRequestType, kinds: Vec<EntryKind>) -> MarketDataRequest {
        MarketDataRequest {
            request_id: "md_1".to_string(),
            instrument: "BTC-USD".to_string(),
            request_type,
            depth: 10,
            entry_kinds: kinds,
        }
    }

    #[test]
    fn subscribe_request_layout() {
        let sent = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let msg = request(
            SubscriptionRequestType::SnapshotPlusUpdates,
            vec![EntryKind::Bid, EntryKind::Offer],
        )
        .to_message(&identity(), sent);

        assert_eq!(
            msg.to_string(),
            "8=FIXT.1.1|35=V|49=svc-account|56=COIN|52=20250304-05:06:07.000|\
             262=md_1|263=1|264=10|265=1|267=2|269=0|269=1|146=1|55=BTC-USD|"
        );
    }

    #[test]
    fn snapshot_request_omits_update_type() {
        let msg = request(SubscriptionRequestType::SnapshotOnly, vec![EntryKind::Trade])
            .to_message(&identity(), Utc::now());

        assert_eq!(msg.get(263), Some("0"));
        assert_eq!(msg.get(265), None);
        assert_eq!(msg.get(267), Some("1"));
    }

    #[test]
    fn unsubscribe_reuses_request_id() {
        let req = MarketDataRequest::unsubscribe("md_77", "ETH-USD");
        let msg = req.to_message(&identity(), Utc::now());

        assert_eq!(msg.get(262), Some("md_77"));
        assert_eq!(msg.get(263), Some("2"));
        assert_eq!(msg.get(264), Some("0"));
        assert_eq!(msg.get_all(269).collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(msg.get(55), Some("ETH-USD"));
    }

    #[test]
    fn generated_ids_have_prefix() {
        let req = MarketDataRequest::new(
            "BTC-USD",
            SubscriptionRequestType::SnapshotOnly,
            0,
            vec![EntryKind::Trade],
        );

        assert!(is_request_id(&req.request_id));
        assert!(req.request_id[REQUEST_ID_PREFIX.len()..].parse::<i64>().is_ok());
        assert!(!is_request_id("BTC-USD"));
    }

    #[test]
    fn data_category_from_first_recognized_kind() {
        let cases = [
            (vec![EntryKind::Other("Q".to_string()), EntryKind::Trade], Some("trades")),
            (vec![EntryKind::Offer, EntryKind::Trade], Some("order_book")),
            (vec![EntryKind::Volume, EntryKind::Bid], Some("ohlcv")),
            (vec![EntryKind::Other("Q".to_string())], None),
        ];
        for (kinds, expected) in cases {
            let req = request(SubscriptionRequestType::SnapshotOnly, kinds);
            assert_eq!(req.data_category(), expected);
        }
    }

    #[test]
    fn recorded_depth_only_for_book_requests() {
        let mut book = request(SubscriptionRequestType::SnapshotOnly, vec![EntryKind::Bid]);
        assert_eq!(book.recorded_depth(), Some(10));

        book.depth = 0;
        assert_eq!(book.recorded_depth(), None);

        let trades = request(SubscriptionRequestType::SnapshotOnly, vec![EntryKind::Trade]);
        assert_eq!(trades.recorded_depth(), None);
    }
}
