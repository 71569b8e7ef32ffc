//! Market Data Entry Extraction
//!
//! Recovers the repeated `NoMDEntries` groups of a snapshot or incremental
//! refresh by scanning the serialized message text, then normalizes each
//! group into a [`NormalizedRecord`].
//!
//! # Pipeline
//!
//! ```text
//! serialized message ──► EntryBoundaryScanner ──► [offset, offset, ...]
//!                                                   │
//!            span = text[offset_i .. offset_i+1]    ▼
//!                                        EntryNormalizer (per span)
//!                                                   │
//!                                                   ▼
//!                                   Vec<NormalizedRecord> (wire order)
//! ```
//!
//! Extraction is best-effort: a missing field becomes an empty string, a
//! missing delimiter means the value runs to the end of the span, and an
//! unknown discriminator is carried as [`EntryKind::Other`]. Nothing here
//! returns an error. Every type is stateless and may be shared freely
//! across threads.
//!
//! A tag only matches at the start of a field (offset zero or right after a
//! delimiter), so `1269=` or a value containing `269=` never opens a group.

use chrono::Utc;

use super::message::FixMessage;
use super::tags::{
    MSG_TYPE_MARKET_DATA_SNAPSHOT, SOH, TAG_AGGRESSOR_SIDE, TAG_MD_ENTRY_POSITION_NO,
    TAG_MD_ENTRY_PX, TAG_MD_ENTRY_SIZE, TAG_MD_ENTRY_TIME, TAG_MD_ENTRY_TYPE, TAG_MD_REQ_ID,
    TAG_NO_MD_ENTRIES, TAG_SYMBOL,
};
use crate::domain::market_data::{AggressorSide, EntryKind, MarketDataBatch, NormalizedRecord};

/// Marker that opens each entry group (`MDEntryType`, tag 269).
pub const ENTRY_MARKER: &str = "269=";

/// Whether the tag part of a field is exactly `tag` in canonical form.
fn is_tag(key: &str, tag: u32) -> bool {
    !key.is_empty()
        && !key.starts_with('0')
        && key.bytes().all(|b| b.is_ascii_digit())
        && key.parse::<u32>() == Ok(tag)
}

// =============================================================================
// Boundary Scanner
// =============================================================================

/// Locates the byte offset at which each entry group begins.
#[derive(Debug, Clone, Copy)]
pub struct EntryBoundaryScanner {
    delimiter: u8,
}

impl Default for EntryBoundaryScanner {
    fn default() -> Self {
        Self::new(SOH)
    }
}

impl EntryBoundaryScanner {
    /// Create a scanner for text delimited by `delimiter`.
    #[must_use]
    pub const fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Ascending offsets of every entry marker. Empty when there is none.
    #[must_use]
    pub fn scan(&self, raw: &str) -> Vec<usize> {
        let bytes = raw.as_bytes();
        let mut starts = Vec::new();
        let mut from = 0;
        while let Some(pos) = raw[from..].find(ENTRY_MARKER) {
            let at = from + pos;
            if at == 0 || bytes[at - 1] == self.delimiter {
                starts.push(at);
            }
            from = at + ENTRY_MARKER.len();
        }
        starts
    }
}

// =============================================================================
// Entry Normalizer
// =============================================================================

/// Message-level context shared by every entry of one message.
#[derive(Debug, Clone, Copy)]
pub struct EntryContext<'a> {
    /// Instrument (tag 55).
    pub instrument: &'a str,
    /// Request id (tag 262).
    pub request_id: &'a str,
    /// Snapshot (`W`) rather than incremental (`X`).
    pub is_snapshot: bool,
    /// Sequence number (tag 34).
    pub sequence_number: &'a str,
}

/// Converts one entry span into a [`NormalizedRecord`].
#[derive(Debug, Clone, Copy)]
pub struct EntryNormalizer {
    delimiter: u8,
}

impl Default for EntryNormalizer {
    fn default() -> Self {
        Self::new(SOH)
    }
}

impl EntryNormalizer {
    /// Create a normalizer for spans delimited by `delimiter`.
    #[must_use]
    pub const fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Value of the first `tag` field within a span.
    ///
    /// Reads up to the next delimiter, or to the end of the span if there
    /// is none. Empty values are treated as absent.
    #[must_use]
    pub fn field<'s>(&self, span: &'s str, tag: u32) -> Option<&'s str> {
        span.split(char::from(self.delimiter))
            .filter_map(|field| field.split_once('='))
            .find(|(key, _)| is_tag(key, tag))
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }

    /// Produce exactly one record for an entry span.
    ///
    /// `ordinal` is the zero-based index of the entry within its message and
    /// only matters for book levels that omit `MDEntryPositionNo`.
    #[must_use]
    pub fn normalize(&self, span: &str, ctx: &EntryContext<'_>, ordinal: usize) -> NormalizedRecord {
        let kind =
            EntryKind::from_wire(self.field(span, TAG_MD_ENTRY_TYPE).unwrap_or_default());
        let text = |tag: u32| self.field(span, tag).unwrap_or_default().to_string();

        let book_position = match self.field(span, TAG_MD_ENTRY_POSITION_NO) {
            Some(position) => Some(position.to_string()),
            None if kind.is_book() => Some((ordinal + 1).to_string()),
            None => None,
        };

        let side = (kind == EntryKind::Trade).then(|| {
            AggressorSide::from_wire(self.field(span, TAG_AGGRESSOR_SIDE).unwrap_or_default())
        });

        NormalizedRecord {
            instrument: ctx.instrument.to_string(),
            price: text(TAG_MD_ENTRY_PX),
            quantity: text(TAG_MD_ENTRY_SIZE),
            event_time: text(TAG_MD_ENTRY_TIME),
            kind,
            side,
            book_position,
            request_id: ctx.request_id.to_string(),
            is_snapshot: ctx.is_snapshot,
            sequence_number: ctx.sequence_number.to_string(),
            received_at: Utc::now(),
        }
    }
}

// =============================================================================
// Message Extractor
// =============================================================================

/// Runs the scanner and normalizer over a whole message.
///
/// # Example
///
/// ```rust
/// use fix_market_data::domain::market_data::EntryKind;
/// use fix_market_data::infrastructure::fix::{EntryContext, MessageExtractor};
///
/// let extractor = MessageExtractor::with_delimiter(b'|');
/// let ctx = EntryContext {
///     instrument: "BTC-USD",
///     request_id: "md_1",
///     is_snapshot: true,
///     sequence_number: "3",
/// };
///
/// let records = extractor.extract("268=2|269=0|270=100|271=1|269=1|270=101|271=2|", Some("2"), &ctx);
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[1].kind, EntryKind::Offer);
/// assert_eq!(records[1].book_position.as_deref(), Some("2"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MessageExtractor {
    delimiter: u8,
    scanner: EntryBoundaryScanner,
    normalizer: EntryNormalizer,
}

impl Default for MessageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageExtractor {
    /// Extractor for SOH-delimited wire text.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_delimiter(SOH)
    }

    /// Extractor for text using another delimiter, such as `|` in logs.
    #[must_use]
    pub const fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            scanner: EntryBoundaryScanner::new(delimiter),
            normalizer: EntryNormalizer::new(delimiter),
        }
    }

    /// Extract every entry of a serialized message.
    ///
    /// When `declared_count` is absent or `"0"` the text is not scanned at
    /// all. Otherwise one record is produced per entry marker found; the
    /// result may hold fewer records than declared.
    #[must_use]
    pub fn extract(
        &self,
        raw: &str,
        declared_count: Option<&str>,
        ctx: &EntryContext<'_>,
    ) -> Vec<NormalizedRecord> {
        match declared_count.map(str::trim) {
            None | Some("" | "0") => return Vec::new(),
            Some(_) => {}
        }

        let starts = self.scanner.scan(raw);
        starts
            .iter()
            .enumerate()
            .map(|(ordinal, &start)| {
                let end = starts.get(ordinal + 1).copied().unwrap_or(raw.len());
                self.normalizer.normalize(&raw[start..end], ctx, ordinal)
            })
            .collect()
    }

    /// Extract a parsed snapshot or incremental message into a batch.
    ///
    /// Reads `MDReqID`, `Symbol`, `NoMDEntries` and `MsgSeqNum` from the
    /// message and scans its serialized form.
    #[must_use]
    pub fn extract_message(&self, message: &FixMessage) -> MarketDataBatch {
        let instrument = message.get_or_empty(TAG_SYMBOL);
        let request_id = message.get_or_empty(TAG_MD_REQ_ID);
        let sequence_number = message.seq_num();
        let declared = message.get(TAG_NO_MD_ENTRIES);
        let is_snapshot = message.msg_type() == Some(MSG_TYPE_MARKET_DATA_SNAPSHOT);

        let ctx = EntryContext {
            instrument,
            request_id,
            is_snapshot,
            sequence_number,
        };
        let raw = message.to_wire_with(self.delimiter);
        let records = self.extract(&raw, declared, &ctx);

        MarketDataBatch {
            instrument: instrument.to_string(),
            request_id: request_id.to_string(),
            sequence_number: sequence_number.to_string(),
            is_snapshot,
            declared_entries: declared.map(str::to_string),
            records,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;
    use crate::infrastructure::fix::tags::PIPE;

    const CTX: EntryContext<'static> = EntryContext {
        instrument: "BTC-USD",
        request_id: "md_1",
        is_snapshot: true,
        sequence_number: "42",
    };

    fn pipe_normalizer() -> EntryNormalizer {
        EntryNormalizer::new(PIPE)
    }

    // -------------------------------------------------------------------------
    // Scanner
    // -------------------------------------------------------------------------

    #[test]
    fn scan_finds_every_marker_in_order() {
        let raw = "35=W|268=3|269=0|270=1|269=1|270=2|269=2|270=3|";
        let starts = EntryBoundaryScanner::new(PIPE).scan(raw);

        assert_eq!(starts.len(), 3);
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        for start in starts {
            assert!(raw[start..].starts_with(ENTRY_MARKER));
        }
    }

    #[test]
    fn entry_marker_matches_entry_type_tag() {
        assert_eq!(ENTRY_MARKER, format!("{TAG_MD_ENTRY_TYPE}="));
    }

    #[test_case("269=2|270=10|", TAG_MD_ENTRY_PX, Some("10") ; "price")]
    #[test_case("269=2|2701=9|270=10|", TAG_MD_ENTRY_PX, Some("10") ; "longer tag skipped")]
    #[test_case("269=2|0270=9|", TAG_MD_ENTRY_PX, None ; "leading zero is not the tag")]
    #[test_case("269=2|270=|", TAG_MD_ENTRY_PX, None ; "empty value")]
    #[test_case("269=2|2446=1", TAG_AGGRESSOR_SIDE, Some("1") ; "value runs to span end")]
    #[test_case("269=2|58=x270=5|", TAG_MD_ENTRY_PX, None ; "tag text inside a value")]
    fn field_lookup_by_tag(span: &str, tag: u32, expected: Option<&str>) {
        assert_eq!(pipe_normalizer().field(span, tag), expected);
    }

    #[test]
    fn scan_without_marker_is_empty() {
        assert!(EntryBoundaryScanner::new(PIPE).scan("35=W|268=0|").is_empty());
        assert!(EntryBoundaryScanner::default().scan("").is_empty());
    }

    #[test]
    fn scan_ignores_marker_inside_other_fields() {
        let raw = "58=note 269=x|1269=5|269=2|270=1|";
        let starts = EntryBoundaryScanner::new(PIPE).scan(raw);

        assert_eq!(starts, vec![raw.rfind("269=2").unwrap()]);
    }

    #[test]
    fn scan_accepts_marker_at_offset_zero() {
        assert_eq!(EntryBoundaryScanner::new(PIPE).scan("269=0|270=1|"), vec![0]);
    }

    // -------------------------------------------------------------------------
    // Normalizer
    // -------------------------------------------------------------------------

    #[test]
    fn bid_without_position_uses_ordinal() {
        let record = pipe_normalizer().normalize("269=0|270=49999.99|271=2.0|", &CTX, 0);

        assert_eq!(record.kind, EntryKind::Bid);
        assert_eq!(record.price, "49999.99");
        assert_eq!(record.quantity, "2.0");
        assert_eq!(record.book_position.as_deref(), Some("1"));
        assert_eq!(record.side, None);
    }

    #[test]
    fn trade_with_buy_aggressor() {
        let record = pipe_normalizer().normalize("269=2|270=50000.00|271=1.5|2446=1|", &CTX, 3);

        assert_eq!(record.kind, EntryKind::Trade);
        assert_eq!(record.side, Some(AggressorSide::Buy));
        assert_eq!(record.book_position, None);
    }

    #[test_case("269=2|270=1|271=1|2446=2|", AggressorSide::Sell ; "sell")]
    #[test_case("269=2|270=1|271=1|2446=9|", AggressorSide::Unknown ; "unrecognized")]
    #[test_case("269=2|270=1|271=1|", AggressorSide::Unknown ; "absent")]
    #[test_case("269=2|270=1|271=1|2446=", AggressorSide::Unknown ; "empty at end")]
    fn trade_side_normalization(span: &str, expected: AggressorSide) {
        assert_eq!(pipe_normalizer().normalize(span, &CTX, 0).side, Some(expected));
    }

    #[test]
    fn explicit_position_wins_over_ordinal() {
        let record = pipe_normalizer().normalize("269=1|270=10|271=1|290=7|", &CTX, 0);
        assert_eq!(record.book_position.as_deref(), Some("7"));
    }

    #[test]
    fn empty_position_falls_back_to_ordinal() {
        let record = pipe_normalizer().normalize("269=1|290=|270=10|", &CTX, 4);
        assert_eq!(record.book_position.as_deref(), Some("5"));
    }

    #[test]
    fn value_without_delimiter_runs_to_end_of_span() {
        let record = pipe_normalizer().normalize("269=4|273=20250101-00:00:00|270=123.45", &CTX, 0);

        assert_eq!(record.kind, EntryKind::Open);
        assert_eq!(record.price, "123.45");
        assert_eq!(record.event_time, "20250101-00:00:00");
    }

    #[test]
    fn missing_fields_become_empty() {
        let record = pipe_normalizer().normalize("269=B|", &CTX, 0);

        assert_eq!(record.kind, EntryKind::Volume);
        assert_eq!(record.price, "");
        assert_eq!(record.quantity, "");
        assert_eq!(record.event_time, "");
        assert_eq!(record.book_position, None);
    }

    #[test]
    fn unknown_kind_is_kept_verbatim() {
        let record = pipe_normalizer().normalize("269=Q|270=1|271=2|", &CTX, 0);

        assert_eq!(record.kind, EntryKind::Other("Q".to_string()));
        assert_eq!(record.price, "1");
        assert_eq!(record.side, None);
    }

    #[test]
    fn context_is_copied_onto_record() {
        let record = pipe_normalizer().normalize("269=2|270=1|", &CTX, 0);

        assert_eq!(record.instrument, "BTC-USD");
        assert_eq!(record.request_id, "md_1");
        assert_eq!(record.sequence_number, "42");
        assert!(record.is_snapshot);
    }

    #[test]
    fn size_field_is_not_confused_with_longer_tags() {
        let record = pipe_normalizer().normalize("269=0|1271=9|271=3|270=5|", &CTX, 0);
        assert_eq!(record.quantity, "3");
    }

    // -------------------------------------------------------------------------
    // Extractor
    // -------------------------------------------------------------------------

    #[test_case(None ; "absent")]
    #[test_case(Some("0") ; "zero")]
    #[test_case(Some("") ; "empty")]
    fn declared_zero_short_circuits(declared: Option<&str>) {
        let raw = "268=0|269=0|270=1|271=1|";
        let records = MessageExtractor::with_delimiter(PIPE).extract(raw, declared, &CTX);
        assert!(records.is_empty());
    }

    #[test]
    fn fewer_entries_than_declared_is_accepted() {
        let raw = "268=5|269=0|270=1|271=1|";
        let records = MessageExtractor::with_delimiter(PIPE).extract(raw, Some("5"), &CTX);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn last_entry_runs_to_message_end() {
        let raw = "268=2|269=0|270=1|271=1|269=1|270=2|271=3|10=123|";
        let records = MessageExtractor::with_delimiter(PIPE).extract(raw, Some("2"), &CTX);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].quantity, "3");
        assert_eq!(records[0].quantity, "1");
    }

    #[test]
    fn extract_message_reads_header_and_body() {
        let msg = FixMessage::parse(
            "8=FIXT.1.1|35=X|34=99|262=md_7|55=ETH-USD|268=2|269=2|270=3000|271=0.5|2446=2|269=B|271=1200|",
        )
        .unwrap();

        let batch = MessageExtractor::new().extract_message(&msg);

        assert_eq!(batch.instrument, "ETH-USD");
        assert_eq!(batch.request_id, "md_7");
        assert_eq!(batch.sequence_number, "99");
        assert_eq!(batch.declared_entries.as_deref(), Some("2"));
        assert!(!batch.is_snapshot);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].side, Some(AggressorSide::Sell));
        assert_eq!(batch.records[1].kind, EntryKind::Volume);
        assert_eq!(batch.records[1].value(), "1200");
        assert!(batch.records.iter().all(|r| r.sequence_number == "99"));
    }

    #[test]
    fn extract_message_without_entries() {
        let msg = FixMessage::parse("35=W|34=1|262=md_1|55=BTC-USD|268=0|").unwrap();

        let batch = MessageExtractor::new().extract_message(&msg);

        assert!(batch.is_empty());
        assert!(batch.is_snapshot);
    }

    fn entry() -> impl Strategy<Value = (String, Option<u8>)> {
        (
            prop::sample::select(vec!["0", "1", "2", "4", "5", "7", "8", "B", "Z"]),
            prop::option::of(1u8..50),
        )
            .prop_map(|(kind, position)| (kind.to_string(), position))
    }

    proptest! {
        #[test]
        fn one_record_per_well_formed_entry(entries in prop::collection::vec(entry(), 1..30)) {
            let mut raw = format!("35=W|262=md_1|55=BTC-USD|268={}|", entries.len());
            for (i, (kind, position)) in entries.iter().enumerate() {
                raw.push_str(&format!("269={kind}|270={i}.5|271=1|"));
                if let Some(p) = position {
                    raw.push_str(&format!("290={p}|"));
                }
            }

            let count = entries.len().to_string();
            let records = MessageExtractor::with_delimiter(PIPE).extract(&raw, Some(&count), &CTX);

            prop_assert_eq!(records.len(), entries.len());
            for (i, (record, (kind, position))) in records.iter().zip(&entries).enumerate() {
                prop_assert_eq!(record.kind.as_wire(), kind.as_str());
                prop_assert_eq!(&record.price, &format!("{i}.5"));
                let expected = match position {
                    Some(p) => Some(p.to_string()),
                    None if record.kind.is_book() => Some((i + 1).to_string()),
                    None => None,
                };
                prop_assert_eq!(&record.book_position, &expected);
            }
        }

        #[test]
        fn never_panics_on_arbitrary_text(raw in ".{0,200}") {
            let _ = MessageExtractor::with_delimiter(PIPE).extract(&raw, Some("1"), &CTX);
            let _ = MessageExtractor::new().extract(&raw, Some("1"), &CTX);
        }
    }
}
