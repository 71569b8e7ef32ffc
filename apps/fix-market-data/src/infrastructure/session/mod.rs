//! Session Adapters
//!
//! [`OrderSender`] implementations. The live FIX engine handshake is not
//! wired here; [`DryRunSender`] stands in for it when replaying captured
//! traffic so outbound requests are visible without a connection.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::application::ports::{OrderSender, TransportError};
use crate::infrastructure::fix::FixMessage;

/// Sender that logs each outbound message instead of transmitting it.
#[derive(Debug, Default)]
pub struct DryRunSender {
    sent: AtomicU64,
}

impl DryRunSender {
    /// Create a new dry-run sender.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
        }
    }

    /// Messages "sent" so far.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderSender for DryRunSender {
    async fn send(&self, message: FixMessage) -> Result<(), TransportError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            msg_type = message.msg_type().unwrap_or_default(),
            message = %message,
            "Dry run: outbound message not transmitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sent_messages() {
        let sender = DryRunSender::new();
        let message = FixMessage::new().with_field(35, "V").with_field(262, "md_1");

        tokio_test::block_on(async {
            sender.send(message.clone()).await.unwrap();
            sender.send(message).await.unwrap();
        });

        assert_eq!(sender.sent_count(), 2);
    }
}
