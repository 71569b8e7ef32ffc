//! Market Data Records
//!
//! The normalized record shape shared by every market data entry kind.
//! Prices and sizes stay as the text received on the wire; callers that
//! need arithmetic go through [`NormalizedRecord::price_decimal`] and
//! friends, never through floating point.
//!
//! # Entry Kinds
//!
//! | Wire | Kind   | `price` holds | `quantity` holds |
//! |------|--------|---------------|------------------|
//! | `0`  | Bid    | level price   | level size       |
//! | `1`  | Offer  | level price   | level size       |
//! | `2`  | Trade  | print price   | print size       |
//! | `4`  | Open   | candle value  | -                |
//! | `5`  | Close  | candle value  | -                |
//! | `7`  | High   | candle value  | -                |
//! | `8`  | Low    | candle value  | -                |
//! | `B`  | Volume | -             | volume           |
//!
//! Any other token is carried verbatim as [`EntryKind::Other`].

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

// =============================================================================
// Entry Kind
// =============================================================================

/// Discriminator of one market data entry (wire tag 269).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    /// Order book bid level.
    Bid,
    /// Order book offer level.
    Offer,
    /// Executed trade print.
    Trade,
    /// Candle open.
    Open,
    /// Candle close.
    Close,
    /// Candle high.
    High,
    /// Candle low.
    Low,
    /// Traded volume.
    Volume,
    /// Unrecognized discriminator, kept as received.
    Other(String),
}

impl EntryKind {
    /// Every recognized kind, in wire-code order.
    pub const KNOWN: [Self; 8] = [
        Self::Bid,
        Self::Offer,
        Self::Trade,
        Self::Open,
        Self::Close,
        Self::High,
        Self::Low,
        Self::Volume,
    ];

    /// Map a wire token to a kind. Never fails.
    #[must_use]
    pub fn from_wire(token: &str) -> Self {
        match token {
            "0" => Self::Bid,
            "1" => Self::Offer,
            "2" => Self::Trade,
            "4" => Self::Open,
            "5" => Self::Close,
            "7" => Self::High,
            "8" => Self::Low,
            "B" => Self::Volume,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire token for this kind.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Bid => "0",
            Self::Offer => "1",
            Self::Trade => "2",
            Self::Open => "4",
            Self::Close => "5",
            Self::High => "7",
            Self::Low => "8",
            Self::Volume => "B",
            Self::Other(raw) => raw,
        }
    }

    /// Human-readable name. Unknown kinds show their raw token.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bid => "Bid",
            Self::Offer => "Offer",
            Self::Trade => "Trade",
            Self::Open => "Open",
            Self::Close => "Close",
            Self::High => "High",
            Self::Low => "Low",
            Self::Volume => "Volume",
            Self::Other(raw) => raw,
        }
    }

    /// Bid or Offer.
    #[must_use]
    pub const fn is_book(&self) -> bool {
        matches!(self, Self::Bid | Self::Offer)
    }

    /// Open, Close, High, Low or Volume.
    #[must_use]
    pub const fn is_candle(&self) -> bool {
        matches!(
            self,
            Self::Open | Self::Close | Self::High | Self::Low | Self::Volume
        )
    }

    /// Whether the discriminator was one of the recognized codes.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Aggressor Side
// =============================================================================

/// Side that initiated a trade (wire tag 2446).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AggressorSide {
    /// Buyer lifted the offer.
    Buy,
    /// Seller hit the bid.
    Sell,
    /// Absent or unrecognized.
    Unknown,
}

impl AggressorSide {
    /// `"1"` is Buy, `"2"` is Sell, everything else (including empty) is Unknown.
    #[must_use]
    pub fn from_wire(token: &str) -> Self {
        match token {
            "1" => Self::Buy,
            "2" => Self::Sell,
            _ => Self::Unknown,
        }
    }

    /// Get the side name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AggressorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Normalized Record
// =============================================================================

/// One market data entry after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    /// Instrument identifier (wire tag 55).
    pub instrument: String,
    /// Entry discriminator.
    pub kind: EntryKind,
    /// Price as received (tag 270), empty when absent.
    pub price: String,
    /// Size as received (tag 271). Holds the volume for [`EntryKind::Volume`].
    pub quantity: String,
    /// Aggressor side, set for trades only.
    pub side: Option<AggressorSide>,
    /// 1-based book rank (tag 290), derived from the entry ordinal for
    /// book levels that omit it.
    pub book_position: Option<String>,
    /// Source timestamp (tag 273), not reinterpreted.
    pub event_time: String,
    /// Request the record belongs to (tag 262).
    pub request_id: String,
    /// Part of a full refresh rather than an incremental update.
    pub is_snapshot: bool,
    /// Sequence number of the carrying message (tag 34).
    pub sequence_number: String,
    /// Local wall-clock time of extraction.
    pub received_at: DateTime<Utc>,
}

impl NormalizedRecord {
    /// Inverse of `is_snapshot`.
    #[must_use]
    pub const fn is_update(&self) -> bool {
        !self.is_snapshot
    }

    /// The figure that carries meaning for this kind: the quantity for
    /// volume entries and the price for everything else.
    #[must_use]
    pub fn value(&self) -> &str {
        if self.kind == EntryKind::Volume {
            &self.quantity
        } else {
            &self.price
        }
    }

    /// Price as an exact decimal, if it parses.
    #[must_use]
    pub fn price_decimal(&self) -> Option<Decimal> {
        parse_decimal(&self.price)
    }

    /// Quantity as an exact decimal, if it parses.
    #[must_use]
    pub fn quantity_decimal(&self) -> Option<Decimal> {
        parse_decimal(&self.quantity)
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}

// =============================================================================
// Batch
// =============================================================================

/// All records extracted from one inbound message, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketDataBatch {
    /// Instrument named by the message.
    pub instrument: String,
    /// Request id named by the message.
    pub request_id: String,
    /// Message sequence number as text.
    pub sequence_number: String,
    /// Full refresh (`W`) rather than incremental (`X`).
    pub is_snapshot: bool,
    /// Entry count declared by the message (tag 268), if any.
    pub declared_entries: Option<String>,
    /// Extracted records.
    pub records: Vec<NormalizedRecord>,
}

impl MarketDataBatch {
    /// Number of extracted records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best (first-ranked) bid and offer in this batch, if both sides are present.
    #[must_use]
    pub fn top_of_book(&self) -> Option<(&NormalizedRecord, &NormalizedRecord)> {
        let best = |kind: EntryKind| {
            self.records
                .iter()
                .filter(|r| r.kind == kind)
                .min_by_key(|r| {
                    r.book_position
                        .as_deref()
                        .and_then(|p| p.parse::<u32>().ok())
                        .unwrap_or(u32::MAX)
                })
        };
        Some((best(EntryKind::Bid)?, best(EntryKind::Offer)?))
    }

    /// Offer minus bid at the top of the book.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        let (bid, offer) = self.top_of_book()?;
        Some(offer.price_decimal()? - bid.price_decimal()?)
    }
}

// =============================================================================
// Tests
// =============================================================================
