//! Port interfaces for external calendar reconciliation

use async_trait::async_trait;
use herald_domain::{CalendarEvent, IncrementalSync, Result, SyncBatch, SyncState, SyncToken};

/// External calendar exposing token-based sync.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Full current event set plus a fresh token.
    async fn initial_sync(&self) -> Result<SyncBatch>;

    /// Events added since the last successful call made with `token`.
    ///
    /// A stale or unknown token yields [`IncrementalSync::TokenInvalidated`]
    /// rather than an error.
    async fn incremental_sync(&self, token: &SyncToken) -> Result<IncrementalSync>;
}

/// Local persistence for sync state and the mirrored event set.
///
/// `apply_*` write events and state together so a crash never leaves a
/// token that points past the stored events.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Stored state for `source_id`, default (unsynced) if none.
    async fn load_state(&self, source_id: &str) -> Result<SyncState>;

    /// Replace the mirror with exactly `events` and store `state`.
    /// Returns the mirror size afterwards.
    async fn apply_full(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> Result<usize>;

    /// Upsert `events` into the mirror and store `state`.
    /// Returns the mirror size afterwards.
    async fn apply_delta(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> Result<usize>;

    /// Forget the token so the next run starts with an initial sync.
    async fn clear_token(&self, source_id: &str) -> Result<()>;
}
