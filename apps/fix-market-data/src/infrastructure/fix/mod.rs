//! FIX Protocol Adapters
//!
//! - `tags`: wire constants
//! - `message`: ordered `tag=value` message codec
//! - `extract`: entry scanning and normalization for `W` / `X` messages
//! - `request`: outbound `MarketDataRequest` builder

pub mod extract;
pub mod message;
pub mod request;
pub mod tags;

pub use extract::{EntryBoundaryScanner, EntryContext, EntryNormalizer, MessageExtractor};
pub use message::{Field, FixMessage, FixParseError};
pub use request::{MarketDataRequest, SessionIdentity, is_request_id, new_request_id};
