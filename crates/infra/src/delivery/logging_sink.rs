//! Sink used when no bot token is configured.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use herald_core::DeliverySink;
use herald_domain::{DeliveryError, Destination};
use tracing::info;

/// Writes every delivery to the log and reports success.
#[derive(Debug, Default)]
pub struct LoggingSink {
    sent: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries logged so far.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliverySink for LoggingSink {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
    ) -> Result<(), DeliveryError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(destination = %destination, silent = silent, text = %text, "Delivery (logging sink)");
        Ok(())
    }
}
