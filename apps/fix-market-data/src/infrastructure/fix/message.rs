//! FIX Message Codec
//!
//! A flat, ordered `tag=value` representation of one application message.
//! Repeated groups are kept as consecutive fields in wire order; nothing is
//! reordered or deduplicated, so the serialized form reproduces the entry
//! layout the extractor scans.
//!
//! Parsing accepts SOH or `|` as the field delimiter, which lets log lines
//! and fixtures be replayed directly. Serialization always emits SOH unless
//! a delimiter is given explicitly.

use std::fmt;

use super::tags::{PIPE, SOH, TAG_MSG_SEQ_NUM, TAG_MSG_TYPE};

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixParseError {
    /// Input held no fields.
    #[error("empty FIX message")]
    Empty,

    /// A field had no `=` separator.
    #[error("field without '=' separator: {0}")]
    MissingSeparator(String),

    /// A tag was not a positive integer.
    #[error("invalid tag: {0}")]
    InvalidTag(String),
}

/// One `tag=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Tag number.
    pub tag: u32,
    /// Raw value.
    pub value: String,
}

/// An ordered FIX message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixMessage {
    fields: Vec<Field>,
}

impl FixMessage {
    /// Create an empty message.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parse `tag=value` text delimited by SOH or `|`.
    ///
    /// Trailing line endings and empty segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the text has no fields, a field lacks `=`, or a
    /// tag is not numeric.
    pub fn parse(text: &str) -> Result<Self, FixParseError> {
        let trimmed = text.trim_end_matches(['\r', '\n']);
        let delimiter = if trimmed.as_bytes().contains(&SOH) {
            char::from(SOH)
        } else {
            char::from(PIPE)
        };

        let mut fields = Vec::new();
        for segment in trimmed.split(delimiter).filter(|s| !s.is_empty()) {
            let (tag, value) = segment
                .split_once('=')
                .ok_or_else(|| FixParseError::MissingSeparator(segment.to_string()))?;
            let tag = tag
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| FixParseError::InvalidTag(tag.to_string()))?;
            fields.push(Field {
                tag,
                value: value.to_string(),
            });
        }

        if fields.is_empty() {
            return Err(FixParseError::Empty);
        }

        Ok(Self { fields })
    }

    /// Append a field.
    pub fn push(&mut self, tag: u32, value: impl Into<String>) -> &mut Self {
        self.fields.push(Field {
            tag,
            value: value.into(),
        });
        self
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with_field(mut self, tag: u32, value: impl Into<String>) -> Self {
        self.push(tag, value);
        self
    }

    /// First value for a tag.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// First value for a tag, or `""` when absent.
    #[must_use]
    pub fn get_or_empty(&self, tag: u32) -> &str {
        self.get(tag).unwrap_or_default()
    }

    /// Every value for a tag, in wire order.
    pub fn get_all(&self, tag: u32) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// `MsgType` (tag 35).
    #[must_use]
    pub fn msg_type(&self) -> Option<&str> {
        self.get(TAG_MSG_TYPE)
    }

    /// `MsgSeqNum` (tag 34), or `""`.
    #[must_use]
    pub fn seq_num(&self) -> &str {
        self.get_or_empty(TAG_MSG_SEQ_NUM)
    }

    /// All fields in wire order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the message has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize with SOH delimiters, each field terminated.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_wire_with(SOH)
    }

    /// Serialize with a caller-chosen delimiter byte.
    #[must_use]
    pub fn to_wire_with(&self, delimiter: u8) -> String {
        let delimiter = char::from(delimiter);
        let mut out = String::with_capacity(self.fields.len() * 12);
        for field in &self.fields {
            out.push_str(&field.tag.to_string());
            out.push('=');
            out.push_str(&field.value);
            out.push(delimiter);
        }
        out
    }
}

impl fmt::Display for FixMessage {
    /// Pipe-delimited, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_with(PIPE))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "8=FIXT.1.1|35=W|34=12|262=md_1|55=BTC-USD|268=2|269=0|270=100|271=1|269=1|270=101|271=2|";

    #[test]
    fn parse_pipe_delimited() {
        let msg = FixMessage::parse(SNAPSHOT).unwrap();

        assert_eq!(msg.msg_type(), Some("W"));
        assert_eq!(msg.seq_num(), "12");
        assert_eq!(msg.get(55), Some("BTC-USD"));
        assert_eq!(msg.get(270), Some("100"));
        assert_eq!(msg.get_all(269).collect::<Vec<_>>(), vec!["0", "1"]);
        assert_eq!(msg.len(), 12);
    }

    #[test]
    fn parse_soh_delimited_with_line_ending() {
        let text = SNAPSHOT.replace('|', "\x01") + "\r\n";

        let msg = FixMessage::parse(&text).unwrap();

        assert_eq!(msg, FixMessage::parse(SNAPSHOT).unwrap());
    }

    #[test]
    fn soh_takes_precedence_over_pipe_in_values() {
        let msg = FixMessage::parse("35=Y\x0158=bad|symbol\x01").unwrap();
        assert_eq!(msg.get(58), Some("bad|symbol"));
    }

    #[test]
    fn values_may_contain_equals() {
        let msg = FixMessage::parse("58=a=b|").unwrap();
        assert_eq!(msg.get(58), Some("a=b"));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(FixMessage::parse(""), Err(FixParseError::Empty));
        assert_eq!(FixMessage::parse("||\r\n"), Err(FixParseError::Empty));
        assert_eq!(
            FixMessage::parse("35=W|garbage|"),
            Err(FixParseError::MissingSeparator("garbage".to_string()))
        );
        assert_eq!(
            FixMessage::parse("x=1|"),
            Err(FixParseError::InvalidTag("x".to_string()))
        );
        assert_eq!(
            FixMessage::parse("0=1|"),
            Err(FixParseError::InvalidTag("0".to_string()))
        );
    }

    #[test]
    fn wire_round_trip_keeps_order() {
        let msg = FixMessage::parse(SNAPSHOT).unwrap();

        assert_eq!(msg.to_wire_with(PIPE), SNAPSHOT);
        assert_eq!(msg.to_string(), SNAPSHOT);
        assert_eq!(msg.to_wire(), SNAPSHOT.replace('|', "\x01"));
    }

    #[test]
    fn builder_appends_in_order() {
        let mut msg = FixMessage::new().with_field(35, "V");
        msg.push(262, "md_1").push(263, "1");

        assert_eq!(msg.to_string(), "35=V|262=md_1|263=1|");
        assert_eq!(msg.get_or_empty(999), "");
        assert!(!msg.is_empty());
        assert!(FixMessage::new().is_empty());
    }
}
