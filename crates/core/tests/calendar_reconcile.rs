//! Calendar reconciliation against the in-memory calendar source.

mod support;

use std::sync::Arc;

use herald_core::{CalendarReconciler, CalendarSource, InMemoryCalendar};
use herald_domain::{IncrementalSync, SyncMode, SyncState, SyncToken};
use support::{event, MemorySyncStore};

const SOURCE: &str = "primary";

fn reconciler(calendar: &Arc<InMemoryCalendar>, store: &Arc<MemorySyncStore>) -> CalendarReconciler {
    CalendarReconciler::new(calendar.clone(), store.clone(), SOURCE)
}

#[tokio::test]
async fn first_run_performs_initial_sync() {
    let calendar = Arc::new(InMemoryCalendar::with_events(vec![event("e1"), event("e2")]));
    let store = Arc::new(MemorySyncStore::default());

    let outcome = reconciler(&calendar, &store).reconcile().await.unwrap();

    assert_eq!(outcome.mode, SyncMode::Initial);
    assert_eq!(outcome.received, 2);
    assert_eq!(store.mirror_ids(SOURCE), vec!["e1", "e2"]);
    assert_eq!(store.state(SOURCE).sync_token, calendar.current_token());
    assert_eq!(store.state(SOURCE).last_cursor, 2);
}

#[tokio::test]
async fn later_runs_apply_only_the_delta() {
    let calendar = Arc::new(InMemoryCalendar::with_events(vec![event("e1")]));
    let store = Arc::new(MemorySyncStore::default());
    let reconciler = reconciler(&calendar, &store);

    reconciler.reconcile().await.unwrap();
    calendar.add_event(event("e2"));

    let outcome = reconciler.reconcile().await.unwrap();
    assert_eq!(outcome.mode, SyncMode::Incremental);
    assert_eq!(outcome.received, 1);
    assert_eq!(outcome.mirrored, 2);
    assert_eq!(store.state(SOURCE).last_cursor, 2);

    let idle = reconciler.reconcile().await.unwrap();
    assert_eq!(idle.mode, SyncMode::Incremental);
    assert_eq!(idle.received, 0);
}

#[tokio::test]
async fn wrong_token_is_reported_and_full_sync_returns_both_events() {
    let calendar = InMemoryCalendar::with_events(vec![event("e1")]);
    calendar.initial_sync().await.unwrap();
    calendar.add_event(event("e2"));

    let result = calendar.incremental_sync(&SyncToken::new("bad")).await.unwrap();
    assert_eq!(result, IncrementalSync::TokenInvalidated);

    let full = calendar.initial_sync().await.unwrap();
    let ids: Vec<_> = full.events.iter().map(|e| e.external_id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
}

#[tokio::test]
async fn invalidated_token_replaces_mirror_instead_of_merging() {
    let calendar = Arc::new(InMemoryCalendar::with_events(vec![event("e1"), event("e2")]));
    let store = Arc::new(MemorySyncStore::default());
    // Local state left over from an earlier session: a token the source no
    // longer knows and an event that has since disappeared upstream.
    store.seed(
        SOURCE,
        SyncState { sync_token: Some(SyncToken::new("stale")), last_cursor: 7 },
        vec![event("ghost"), event("e1")],
    );

    let outcome = reconciler(&calendar, &store).reconcile().await.unwrap();

    assert_eq!(outcome.mode, SyncMode::Resync);
    assert_eq!(outcome.mirrored, 2);
    assert_eq!(store.mirror_ids(SOURCE), vec!["e1", "e2"]);
    let state = store.state(SOURCE);
    assert_eq!(state.sync_token, calendar.current_token());
    assert_eq!(state.last_cursor, 2);
}

#[tokio::test]
async fn upstream_expiry_recovers_on_next_run() {
    let calendar = Arc::new(InMemoryCalendar::with_events(vec![event("e1")]));
    let store = Arc::new(MemorySyncStore::default());
    let reconciler = reconciler(&calendar, &store);

    reconciler.reconcile().await.unwrap();
    calendar.expire_token();
    calendar.add_event(event("e2"));

    let outcome = reconciler.reconcile().await.unwrap();
    assert_eq!(outcome.mode, SyncMode::Resync);
    assert_eq!(store.mirror_ids(SOURCE), vec!["e1", "e2"]);

    let next = reconciler.reconcile().await.unwrap();
    assert_eq!(next.mode, SyncMode::Incremental);
}
