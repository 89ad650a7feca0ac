//! External calendar sync types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque cursor issued by a calendar source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(String);

impl SyncToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event as published by an external calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Identifier assigned by the upstream calendar.
    pub external_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
}

/// Items returned by one sync call together with the token to use next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBatch {
    pub events: Vec<CalendarEvent>,
    pub token: SyncToken,
}

/// Result of an incremental sync attempt.
///
/// Invalidation is an expected outcome, not an error: the caller has to
/// fall back to a full initial sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncrementalSync {
    /// Events added since the previous successful call.
    Delta(SyncBatch),
    /// The token is stale or unknown upstream ("410 Gone").
    TokenInvalidated,
}

/// Per-source sync bookkeeping persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub sync_token: Option<SyncToken>,
    /// Number of events consumed so far from the source stream.
    pub last_cursor: u64,
}

impl SyncState {
    pub const fn is_synced(&self) -> bool {
        self.sync_token.is_some()
    }

    /// Drop the token, forcing the next run to start from an initial sync.
    pub fn invalidate(&mut self) {
        self.sync_token = None;
        self.last_cursor = 0;
    }
}

/// Which path a reconciliation run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No token was held; a full sync ran.
    Initial,
    /// Delta applied on top of the local mirror.
    Incremental,
    /// Token was rejected; the mirror was replaced by a full sync.
    Resync,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub mode: SyncMode,
    /// Events received from the source in this run.
    pub received: usize,
    /// Size of the local mirror after the run.
    pub mirrored: usize,
}
