//! FIX Wire Constants
//!
//! Tag numbers, message types and enumerated values used by the market data
//! session. Only the subset this client reads or writes is listed.

/// Field delimiter on the wire (SOH).
pub const SOH: u8 = 0x01;

/// Printable delimiter accepted in logs, fixtures and replay files.
pub const PIPE: u8 = b'|';

/// `BeginString` value for FIX 5.0 over FIXT 1.1.
pub const FIX_BEGIN_STRING: &str = "FIXT.1.1";

/// `SendingTime` layout (UTC, millisecond precision).
pub const FIX_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

// =============================================================================
// Message Types (tag 35)
// =============================================================================

/// Market Data Request.
pub const MSG_TYPE_MARKET_DATA_REQUEST: &str = "V";
/// Market Data Snapshot / Full Refresh.
pub const MSG_TYPE_MARKET_DATA_SNAPSHOT: &str = "W";
/// Market Data Incremental Refresh.
pub const MSG_TYPE_MARKET_DATA_INCREMENTAL: &str = "X";
/// Market Data Request Reject.
pub const MSG_TYPE_MARKET_DATA_REJECT: &str = "Y";

/// `MDUpdateType` incremental refresh.
pub const MD_UPDATE_TYPE_INCREMENTAL: &str = "1";

// =============================================================================
// Header Tags
// =============================================================================

/// `BeginString`.
pub const TAG_BEGIN_STRING: u32 = 8;
/// `MsgSeqNum`.
pub const TAG_MSG_SEQ_NUM: u32 = 34;
/// `MsgType`.
pub const TAG_MSG_TYPE: u32 = 35;
/// `SenderCompID`.
pub const TAG_SENDER_COMP_ID: u32 = 49;
/// `SendingTime`.
pub const TAG_SENDING_TIME: u32 = 52;
/// `TargetCompID`.
pub const TAG_TARGET_COMP_ID: u32 = 56;

// =============================================================================
// Body Tags
// =============================================================================

/// `Symbol`.
pub const TAG_SYMBOL: u32 = 55;
/// `Text`.
pub const TAG_TEXT: u32 = 58;
/// `NoRelatedSym`.
pub const TAG_NO_RELATED_SYM: u32 = 146;
/// `MDReqID`.
pub const TAG_MD_REQ_ID: u32 = 262;
/// `SubscriptionRequestType`.
pub const TAG_SUBSCRIPTION_REQUEST_TYPE: u32 = 263;
/// `MarketDepth`.
pub const TAG_MARKET_DEPTH: u32 = 264;
/// `MDUpdateType`.
pub const TAG_MD_UPDATE_TYPE: u32 = 265;
/// `NoMDEntryTypes`.
pub const TAG_NO_MD_ENTRY_TYPES: u32 = 267;
/// `NoMDEntries`.
pub const TAG_NO_MD_ENTRIES: u32 = 268;
/// `MDEntryType`.
pub const TAG_MD_ENTRY_TYPE: u32 = 269;
/// `MDEntryPx`.
pub const TAG_MD_ENTRY_PX: u32 = 270;
/// `MDEntrySize`.
pub const TAG_MD_ENTRY_SIZE: u32 = 271;
/// `MDEntryTime`.
pub const TAG_MD_ENTRY_TIME: u32 = 273;
/// `MDReqRejReason`.
pub const TAG_MD_REQ_REJ_REASON: u32 = 281;
/// `MDEntryPositionNo`.
pub const TAG_MD_ENTRY_POSITION_NO: u32 = 290;
/// `AggressorSide`.
pub const TAG_AGGRESSOR_SIDE: u32 = 2446;

// =============================================================================
// Reject Reasons (tag 281)
// =============================================================================

/// Describe a `MDReqRejReason` code.
#[must_use]
pub fn reject_reason_description(code: &str) -> &'static str {
    match code {
        "0" => "Unknown symbol",
        "1" => "Duplicate MDReqID",
        "2" => "Insufficient bandwidth",
        "3" => "Insufficient permission",
        "4" => "Invalid SubscriptionRequestType",
        "5" => "Invalid MarketDepth",
        "6" => "Unsupported MDUpdateType",
        "7" => "Other",
        "8" => "Unsupported MDEntryType",
        _ => "Unknown reason",
    }
}

/// Operator hint for the reject reasons that have an obvious fix.
#[must_use]
pub fn reject_reason_hint(code: &str) -> Option<&'static str> {
    match code {
        "0" => Some("Try a different symbol format (e.g., BTCUSD vs BTC-USD)"),
        "3" => Some("Check if your account has market data permissions"),
        "5" => Some("Try MarketDepth=0 (full depth) or MarketDepth=1 (top of book)"),
        "8" => Some("Try different MDEntryType: 0=Bids, 1=Offers, 2=Trades"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("0", "Unknown symbol")]
    #[test_case("1", "Duplicate MDReqID")]
    #[test_case("5", "Invalid MarketDepth")]
    #[test_case("8", "Unsupported MDEntryType")]
    #[test_case("42", "Unknown reason")]
    #[test_case("", "Unknown reason")]
    fn reject_reason_descriptions(code: &str, expected: &str) {
        assert_eq!(reject_reason_description(code), expected);
    }

    #[test]
    fn hints_only_for_actionable_reasons() {
        let hinted: Vec<_> = (0..=9)
            .map(|c| c.to_string())
            .filter(|c| reject_reason_hint(c).is_some())
            .collect();
        assert_eq!(hinted, vec!["0", "3", "5", "8"]);
    }
}
