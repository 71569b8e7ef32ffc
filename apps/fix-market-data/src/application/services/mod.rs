//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `MarketDataStore`: history and subscription facade
//! - `MarketDataClient`: inbound routing and outbound requests

mod client;
mod store;

pub use client::{ClientError, InboundOutcome, MarketDataClient};
pub use store::{IngestReport, MarketDataStore};
