//! Shared test helpers for `herald-core` integration tests.
//!
//! In-memory implementations of the core ports so dispatch and sync tests
//! can focus on behaviour instead of storage.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use herald_core::{DeliveryLedger, DeliverySink, DueItemRepository, SyncStore};
use herald_domain::{
    CalendarEvent, DedupeKey, DeliveryError, Destination, DueItem, DueItemId, ItemKind, Reminder,
    Result as DomainResult, SyncState, Trigger, TriggerRule,
};
use tokio_util::sync::CancellationToken;

/// Fixed reference time for all tests.
pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_760_000_000, 0).unwrap()
}

pub fn reminder(id: i64, owner: i64, offset_secs: i64) -> DueItem {
    DueItem::Reminder(Reminder {
        id: DueItemId(id),
        owner: Destination(owner),
        message: format!("reminder {id}"),
        remind_at: t0() + Duration::seconds(offset_secs),
        done: false,
    })
}

pub fn trigger(id: i64, channel: i64, offset_secs: i64, silent: bool) -> DueItem {
    let fire_at = t0() + Duration::seconds(offset_secs);
    DueItem::Trigger(Trigger {
        id: DueItemId(id),
        dedupe_key: DedupeKey::for_firing(&format!("rule-{id}"), fire_at),
        rule: TriggerRule { text: format!("trigger {id}"), silent },
        channel: Destination(channel),
        next_fire_at: fire_at,
    })
}

pub fn event(id: &str) -> CalendarEvent {
    CalendarEvent { external_id: id.to_string(), title: format!("Event {id}"), starts_at: t0() }
}

/// In-memory repository for a single item kind.
pub struct InMemoryRepository {
    kind: ItemKind,
    items: Mutex<BTreeMap<DueItemId, DueItem>>,
}

impl InMemoryRepository {
    pub fn new(kind: ItemKind, items: Vec<DueItem>) -> Self {
        Self { kind, items: Mutex::new(items.into_iter().map(|item| (item.id(), item)).collect()) }
    }

    pub fn get(&self, id: i64) -> Option<DueItem> {
        self.items.lock().unwrap().get(&DueItemId(id)).cloned()
    }

    pub fn is_done(&self, id: i64) -> bool {
        self.get(id).is_some_and(|item| item.is_done())
    }
}

#[async_trait]
impl DueItemRepository for InMemoryRepository {
    fn kind(&self) -> ItemKind {
        self.kind
    }

    async fn list_due(
        &self,
        before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> DomainResult<Vec<DueItem>> {
        let mut due: Vec<DueItem> =
            self.items.lock().unwrap().values().filter(|item| item.is_due(before)).cloned().collect();
        due.sort_by_key(DueItem::fire_at);
        if let Some(limit) = limit {
            due.truncate(limit);
        }
        Ok(due)
    }

    async fn mark_done(&self, ids: &[DueItemId]) -> DomainResult<usize> {
        let mut items = self.items.lock().unwrap();
        let mut changed = 0;
        for id in ids {
            if let Some(DueItem::Reminder(reminder)) = items.get_mut(id) {
                if !reminder.done {
                    reminder.done = true;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: DueItemId) -> DomainResult<bool> {
        Ok(self.items.lock().unwrap().remove(&id).is_some())
    }
}

/// In-memory ledger with insert-or-ignore semantics.
#[derive(Default)]
pub struct InMemoryLedger {
    keys: Mutex<HashSet<DedupeKey>>,
}

impl InMemoryLedger {
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn contains(&self, key: &DedupeKey) -> bool {
        self.keys.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryLedger {
    async fn record_delivered(&self, _kind: ItemKind, keys: &[DedupeKey]) -> DomainResult<usize> {
        let mut stored = self.keys.lock().unwrap();
        Ok(keys.iter().filter(|key| stored.insert((*key).clone())).count())
    }

    async fn delivered_among(&self, keys: &[DedupeKey]) -> DomainResult<HashSet<DedupeKey>> {
        let stored = self.keys.lock().unwrap();
        Ok(keys.iter().filter(|key| stored.contains(*key)).cloned().collect())
    }
}

/// Sink that records every successful send and can be scripted to fail.
#[derive(Default)]
pub struct ScriptedSink {
    sent: Mutex<Vec<(Destination, String, bool)>>,
    failures: Mutex<HashMap<Destination, usize>>,
    cancel_after_first: Mutex<Option<CancellationToken>>,
}

impl ScriptedSink {
    /// Fail the next `times` sends to `destination`.
    pub fn fail_next(&self, destination: i64, times: usize) {
        self.failures.lock().unwrap().insert(Destination(destination), times);
    }

    /// Cancel `token` while the first send is in flight.
    pub fn cancel_on_first_send(&self, token: CancellationToken) {
        *self.cancel_after_first.lock().unwrap() = Some(token);
    }

    pub fn sent(&self) -> Vec<(Destination, String, bool)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text, _)| text).collect()
    }
}

#[async_trait]
impl DeliverySink for ScriptedSink {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
    ) -> Result<(), DeliveryError> {
        if let Some(token) = self.cancel_after_first.lock().unwrap().take() {
            token.cancel();
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&destination) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeliveryError::Rejected {
                        status: 502,
                        description: "Bad Gateway".into(),
                    });
                }
            }
        }

        self.sent.lock().unwrap().push((destination, text.to_string(), silent));
        Ok(())
    }
}

/// In-memory sync store keyed by source id.
#[derive(Default)]
pub struct MemorySyncStore {
    states: Mutex<HashMap<String, SyncState>>,
    mirrors: Mutex<HashMap<String, BTreeMap<String, CalendarEvent>>>,
}

impl MemorySyncStore {
    pub fn seed(&self, source_id: &str, state: SyncState, events: Vec<CalendarEvent>) {
        self.states.lock().unwrap().insert(source_id.to_string(), state);
        self.mirrors.lock().unwrap().insert(
            source_id.to_string(),
            events.into_iter().map(|e| (e.external_id.clone(), e)).collect(),
        );
    }

    pub fn mirror_ids(&self, source_id: &str) -> Vec<String> {
        self.mirrors
            .lock()
            .unwrap()
            .get(source_id)
            .map(|events| events.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn state(&self, source_id: &str) -> SyncState {
        self.states.lock().unwrap().get(source_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn load_state(&self, source_id: &str) -> DomainResult<SyncState> {
        Ok(self.state(source_id))
    }

    async fn apply_full(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> DomainResult<usize> {
        let mirror: BTreeMap<String, CalendarEvent> =
            events.iter().map(|e| (e.external_id.clone(), e.clone())).collect();
        let size = mirror.len();
        self.mirrors.lock().unwrap().insert(source_id.to_string(), mirror);
        self.states.lock().unwrap().insert(source_id.to_string(), state.clone());
        Ok(size)
    }

    async fn apply_delta(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> DomainResult<usize> {
        let mut mirrors = self.mirrors.lock().unwrap();
        let mirror = mirrors.entry(source_id.to_string()).or_default();
        for event in events {
            mirror.insert(event.external_id.clone(), event.clone());
        }
        let size = mirror.len();
        self.states.lock().unwrap().insert(source_id.to_string(), state.clone());
        Ok(size)
    }

    async fn clear_token(&self, source_id: &str) -> DomainResult<()> {
        if let Some(state) = self.states.lock().unwrap().get_mut(source_id) {
            state.invalidate();
        }
        Ok(())
    }
}
