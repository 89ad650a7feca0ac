//! Keeps a local event mirror in step with an external calendar.
//!
//! Incremental sync is only an optimisation. Whenever the source rejects the
//! stored token the mirror is rebuilt from a full sync, and the full result
//! replaces whatever deltas were applied before.

use std::sync::Arc;

use herald_domain::{IncrementalSync, Result, SyncMode, SyncOutcome, SyncState};
use tracing::{debug, info, warn};

use super::ports::{CalendarSource, SyncStore};

/// Runs one sync pass for a single source.
pub struct CalendarReconciler {
    source: Arc<dyn CalendarSource>,
    store: Arc<dyn SyncStore>,
    source_id: String,
}

impl CalendarReconciler {
    pub fn new(
        source: Arc<dyn CalendarSource>,
        store: Arc<dyn SyncStore>,
        source_id: impl Into<String>,
    ) -> Self {
        Self { source, store, source_id: source_id.into() }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Incremental sync when a token is held, full sync otherwise or after
    /// invalidation.
    pub async fn reconcile(&self) -> Result<SyncOutcome> {
        let state = self.store.load_state(&self.source_id).await?;

        let Some(token) = state.sync_token.clone() else {
            debug!(source_id = %self.source_id, "No sync token; running initial sync");
            return self.full_sync(SyncMode::Initial).await;
        };

        match self.source.incremental_sync(&token).await? {
            IncrementalSync::Delta(batch) => {
                let received = batch.events.len();
                let next = SyncState {
                    sync_token: Some(batch.token),
                    last_cursor: state.last_cursor.saturating_add(count_to_u64(received)),
                };
                let mirrored =
                    self.store.apply_delta(&self.source_id, &batch.events, &next).await?;
                debug!(
                    source_id = %self.source_id,
                    received = received,
                    mirrored = mirrored,
                    "Incremental sync applied"
                );
                Ok(SyncOutcome { mode: SyncMode::Incremental, received, mirrored })
            }
            IncrementalSync::TokenInvalidated => {
                warn!(source_id = %self.source_id, "Sync token invalidated; running full resync");
                self.store.clear_token(&self.source_id).await?;
                self.full_sync(SyncMode::Resync).await
            }
        }
    }

    async fn full_sync(&self, mode: SyncMode) -> Result<SyncOutcome> {
        let batch = self.source.initial_sync().await?;
        let received = batch.events.len();
        let state =
            SyncState { sync_token: Some(batch.token), last_cursor: count_to_u64(received) };
        let mirrored = self.store.apply_full(&self.source_id, &batch.events, &state).await?;

        info!(
            source_id = %self.source_id,
            mode = ?mode,
            received = received,
            mirrored = mirrored,
            "Full calendar sync applied"
        );
        Ok(SyncOutcome { mode, received, mirrored })
    }
}

fn count_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
