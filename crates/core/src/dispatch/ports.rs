//! Port interfaces consumed by the dispatch engine

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_domain::{
    DedupeKey, DeliveryError, Destination, DueItem, DueItemId, ItemKind, Result, TextFormat,
};

/// Storage of one kind of due item.
#[async_trait]
pub trait DueItemRepository: Send + Sync {
    /// Kind of item this repository serves.
    fn kind(&self) -> ItemKind;

    /// Items with `fire_at <= before` that are still pending, earliest first.
    async fn list_due(&self, before: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<DueItem>>;

    /// Flag the given items as done. Already-done or missing ids are
    /// skipped; returns the number of rows that changed.
    async fn mark_done(&self, ids: &[DueItemId]) -> Result<usize>;

    /// Remove one item. Returns `false` if it was already gone.
    async fn delete(&self, id: DueItemId) -> Result<bool>;
}

/// Durable record of deliveries keyed by dedupe key.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Insert-or-ignore each key. Returns how many keys were new.
    async fn record_delivered(&self, kind: ItemKind, keys: &[DedupeKey]) -> Result<usize>;

    /// Subset of `keys` already present in the ledger.
    async fn delivered_among(&self, keys: &[DedupeKey]) -> Result<HashSet<DedupeKey>>;

    /// Whether a single key is present.
    async fn is_delivered(&self, key: &DedupeKey) -> Result<bool> {
        let found = self.delivered_among(std::slice::from_ref(key)).await?;
        Ok(found.contains(key))
    }
}

/// Outbound messaging channel.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver `text` to `destination`. `silent` asks the channel to skip
    /// the audible notification.
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
    ) -> std::result::Result<(), DeliveryError>;

    /// Deliver `text` rendered as `format`. Sinks without markup support
    /// send the text unchanged.
    async fn send_formatted(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
        _format: TextFormat,
    ) -> std::result::Result<(), DeliveryError> {
        self.send(destination, text, silent).await
    }
}
