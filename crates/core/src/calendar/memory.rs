//! In-process calendar source.
//!
//! Implements the token protocol of a real calendar API: an initial sync
//! issues a fresh token and moves the cursor to the end of the event list;
//! an incremental sync with the current token returns what was appended
//! since; any other token drops the source back to the unsynced state.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use herald_domain::{CalendarEvent, IncrementalSync, Result, SyncBatch, SyncToken};
use tracing::warn;

use super::ports::CalendarSource;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<CalendarEvent>,
    token: Option<SyncToken>,
    cursor: usize,
    generation: u64,
}

/// Calendar held in memory, used for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    inner: Mutex<Inner>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the calendar with existing events.
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self { inner: Mutex::new(Inner { events, ..Inner::default() }) }
    }

    /// Append an event, visible to the next sync.
    pub fn add_event(&self, event: CalendarEvent) {
        self.lock().events.push(event);
    }

    /// Token currently accepted, `None` when unsynced.
    pub fn current_token(&self) -> Option<SyncToken> {
        self.lock().token.clone()
    }

    /// Expire the current token as an upstream would after retention ends.
    pub fn expire_token(&self) {
        self.lock().token = None;
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("In-memory calendar mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl CalendarSource for InMemoryCalendar {
    async fn initial_sync(&self) -> Result<SyncBatch> {
        let mut inner = self.lock();
        inner.generation += 1;
        let token = SyncToken::new(format!("sync-{}", inner.generation));
        inner.token = Some(token.clone());
        inner.cursor = inner.events.len();
        Ok(SyncBatch { events: inner.events.clone(), token })
    }

    async fn incremental_sync(&self, token: &SyncToken) -> Result<IncrementalSync> {
        let mut inner = self.lock();
        if inner.token.as_ref() != Some(token) {
            inner.token = None;
            return Ok(IncrementalSync::TokenInvalidated);
        }

        let delta = inner.events[inner.cursor..].to_vec();
        inner.cursor = inner.events.len();
        Ok(IncrementalSync::Delta(SyncBatch { events: delta, token: token.clone() }))
    }
}
