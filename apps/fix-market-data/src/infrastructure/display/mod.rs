//! Operator Display
//!
//! Renders market data batches as human-readable log lines. Formatting is
//! kept in pure functions so it can be tested without a subscriber;
//! [`LogDisplay`] only forwards the lines to `tracing`.

use std::fmt::Write as _;

use crate::application::ports::MarketDataView;
use crate::domain::market_data::{EntryKind, MarketDataBatch, NormalizedRecord};

/// Placeholder for absent values.
const MISSING: &str = "-";

fn or_missing(text: &str) -> &str {
    if text.is_empty() { MISSING } else { text }
}

/// Entries without a discriminator are shown as trades.
fn display_kind(kind: &EntryKind) -> &EntryKind {
    match kind {
        EntryKind::Other(raw) if raw.is_empty() => &EntryKind::Trade,
        other => other,
    }
}

/// One line for an incremental update.
#[must_use]
pub fn incremental_line(record: &NormalizedRecord) -> String {
    let symbol = &record.instrument;
    let price = or_missing(&record.price);
    let size = or_missing(&record.quantity);

    match display_kind(&record.kind) {
        kind @ (EntryKind::Bid | EntryKind::Offer) => format!(
            "{symbol} {kind}: {price} | Size: {size} | Pos: {}",
            or_missing(record.book_position.as_deref().unwrap_or_default())
        ),
        EntryKind::Trade => format!(
            "{symbol} Trade: {price} | Size: {size} | Aggressor: {}",
            record.side.map_or(MISSING, |side| side.as_str())
        ),
        EntryKind::Volume => format!("{symbol} Volume: {size}"),
        kind if kind.is_candle() => format!("{symbol} {kind}: {price}"),
        kind => format!("{symbol} [{kind}]: {price} | Size: {size}"),
    }
}

/// Lines for a full refresh: a header, one section per entry kind in
/// first-seen order, the top-of-book spread when both sides are present,
/// and a total.
#[must_use]
pub fn snapshot_lines(batch: &MarketDataBatch) -> Vec<String> {
    let mut groups: Vec<(&EntryKind, Vec<&NormalizedRecord>)> = Vec::new();
    for record in &batch.records {
        let kind = display_kind(&record.kind);
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, members)) => members.push(record),
            None => groups.push((kind, vec![record])),
        }
    }

    let mut lines = vec![format!("Market Data Snapshot for {}", batch.instrument)];
    for (kind, members) in &groups {
        lines.push(format!("{kind} ({})", members.len()));
        for (i, record) in members.iter().enumerate() {
            let mut line = String::from("  ");
            let time = or_missing(&record.event_time);
            // Writing to a String cannot fail.
            let _ = match kind {
                EntryKind::Bid | EntryKind::Offer => write!(
                    line,
                    "[{}] {} x {} @ {time}",
                    or_missing(record.book_position.as_deref().unwrap_or_default()),
                    or_missing(&record.price),
                    or_missing(&record.quantity),
                ),
                EntryKind::Trade => write!(
                    line,
                    "#{} {} x {} @ {time} ({})",
                    i + 1,
                    or_missing(&record.price),
                    or_missing(&record.quantity),
                    record.side.map_or(MISSING, |side| side.as_str()),
                ),
                _ => write!(line, "#{} {} @ {time}", i + 1, or_missing(record.value())),
            };
            lines.push(line);
        }
    }

    if let Some(spread) = batch.spread() {
        lines.push(format!("Spread: {spread}"));
    }
    lines.push(format!("Total Entries Displayed: {}", batch.len()));
    lines
}

/// [`MarketDataView`] that writes through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl MarketDataView for LogDisplay {
    fn show_snapshot(&self, batch: &MarketDataBatch) {
        for line in snapshot_lines(batch) {
            tracing::info!(target: "fix_market_data::display", "{line}");
        }
    }

    fn show_incremental(&self, batch: &MarketDataBatch) {
        for record in &batch.records {
            tracing::info!(target: "fix_market_data::display", "{}", incremental_line(record));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use test_case::test_case;

    use super::*;
    use crate::domain::market_data::AggressorSide;

    fn record(kind: EntryKind, price: &str, quantity: &str) -> NormalizedRecord {
        NormalizedRecord {
            instrument: "BTC-USD".to_string(),
            kind,
            price: price.to_string(),
            quantity: quantity.to_string(),
            side: None,
            book_position: None,
            event_time: String::new(),
            request_id: "md_1".to_string(),
            is_snapshot: false,
            sequence_number: "1".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn bid_line_shows_position() {
        let mut bid = record(EntryKind::Bid, "49999.99", "0.5");
        bid.book_position = Some("1".to_string());

        assert_eq!(
            incremental_line(&bid),
            "BTC-USD Bid: 49999.99 | Size: 0.5 | Pos: 1"
        );
    }

    #[test_case(Some(AggressorSide::Buy), "Buy")]
    #[test_case(Some(AggressorSide::Unknown), "Unknown")]
    #[test_case(None, "-")]
    fn trade_line_shows_aggressor(side: Option<AggressorSide>, shown: &str) {
        let mut trade = record(EntryKind::Trade, "100", "2");
        trade.side = side;

        assert_eq!(
            incremental_line(&trade),
            format!("BTC-USD Trade: 100 | Size: 2 | Aggressor: {shown}")
        );
    }

    #[test_case(EntryKind::Open, "", "BTC-USD Open: 100")]
    #[test_case(EntryKind::Low, "", "BTC-USD Low: 100")]
    #[test_case(EntryKind::Volume, "5000", "BTC-USD Volume: 5000")]
    #[test_case(EntryKind::Other("Q".to_string()), "3", "BTC-USD [Q]: 100 | Size: 3")]
    #[test_case(EntryKind::Other(String::new()), "3", "BTC-USD Trade: 100 | Size: 3 | Aggressor: -")]
    fn other_kinds(kind: EntryKind, quantity: &str, expected: &str) {
        assert_eq!(incremental_line(&record(kind, "100", quantity)), expected);
    }

    #[test]
    fn snapshot_groups_by_first_seen_kind() {
        let mut bid = record(EntryKind::Bid, "100", "1");
        bid.book_position = Some("1".to_string());
        let mut offer = record(EntryKind::Offer, "101.5", "2");
        offer.book_position = Some("1".to_string());
        let mut trade = record(EntryKind::Trade, "100.5", "0.1");
        trade.side = Some(AggressorSide::Sell);
        trade.event_time = "20250101-00:00:00.000".to_string();

        let batch = MarketDataBatch {
            instrument: "BTC-USD".to_string(),
            request_id: "md_1".to_string(),
            sequence_number: "1".to_string(),
            is_snapshot: true,
            declared_entries: Some("4".to_string()),
            records: vec![trade, bid, offer, record(EntryKind::Volume, "", "42")],
        };

        assert_eq!(
            snapshot_lines(&batch),
            vec![
                "Market Data Snapshot for BTC-USD",
                "Trade (1)",
                "  #1 100.5 x 0.1 @ 20250101-00:00:00.000 (Sell)",
                "Bid (1)",
                "  [1] 100 x 1 @ -",
                "Offer (1)",
                "  [1] 101.5 x 2 @ -",
                "Volume (1)",
                "  #1 42 @ -",
                "Spread: 1.5",
                "Total Entries Displayed: 4",
            ]
        );
    }

    #[test]
    fn empty_snapshot_has_header_and_total() {
        let batch = MarketDataBatch {
            instrument: "ETH-USD".to_string(),
            request_id: "md_1".to_string(),
            sequence_number: "1".to_string(),
            is_snapshot: true,
            declared_entries: None,
            records: Vec::new(),
        };

        assert_eq!(
            snapshot_lines(&batch),
            vec!["Market Data Snapshot for ETH-USD", "Total Entries Displayed: 0"]
        );
    }
}
