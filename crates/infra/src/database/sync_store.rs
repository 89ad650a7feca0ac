//! SQLite persistence for calendar sync state and the mirrored event set.
//!
//! State and events are written in one transaction so a stored token never
//! points past the events that were actually mirrored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::SyncStore;
use herald_domain::{CalendarEvent, Result as DomainResult, SyncState, SyncToken};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use tokio::task;

use super::manager::DbManager;
use super::util::{from_millis, i64_to_usize, map_join_error, map_sql_error, to_millis};

/// [`SyncStore`] over the `calendar_sync_state` and `synced_events` tables.
pub struct SqliteSyncStore {
    db: Arc<DbManager>,
}

impl SqliteSyncStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Mirrored events for `source_id`, earliest first.
    pub async fn mirrored_events(&self, source_id: &str) -> DomainResult<Vec<CalendarEvent>> {
        let db = Arc::clone(&self.db);
        let source_id = source_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<CalendarEvent>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(EVENTS_LIST_SQL).map_err(map_sql_error)?;
            let rows = stmt.query_map(params![source_id], map_event_row).map_err(map_sql_error)?;
            let events = rows
                .map(|row| row.map_err(map_sql_error))
                .collect::<DomainResult<Vec<_>>>()?;
            Ok(events)
        })
        .await
        .map_err(map_join_error)?
    }

    fn write(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
        replace: bool,
    ) -> task::JoinHandle<DomainResult<usize>> {
        let db = Arc::clone(&self.db);
        let source_id = source_id.to_string();
        let events = events.to_vec();
        let state = state.clone();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            if replace {
                tx.execute(EVENTS_CLEAR_SQL, params![source_id]).map_err(map_sql_error)?;
            }
            upsert_events(&tx, &source_id, &events)?;
            save_state(&tx, &source_id, &state)?;
            let mirrored: i64 = tx
                .query_row(EVENTS_COUNT_SQL, params![source_id], |row| row.get(0))
                .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(i64_to_usize(mirrored))
        })
    }
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn load_state(&self, source_id: &str) -> DomainResult<SyncState> {
        let db = Arc::clone(&self.db);
        let source_id = source_id.to_string();

        task::spawn_blocking(move || -> DomainResult<SyncState> {
            let conn = db.get_connection()?;
            let state = conn
                .query_row(STATE_GET_SQL, params![source_id], map_state_row)
                .optional()
                .map_err(map_sql_error)?;
            Ok(state.unwrap_or_default())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn apply_full(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> DomainResult<usize> {
        self.write(source_id, events, state, true).await.map_err(map_join_error)?
    }

    async fn apply_delta(
        &self,
        source_id: &str,
        events: &[CalendarEvent],
        state: &SyncState,
    ) -> DomainResult<usize> {
        self.write(source_id, events, state, false).await.map_err(map_join_error)?
    }

    async fn clear_token(&self, source_id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let source_id = source_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(STATE_CLEAR_TOKEN_SQL, params![source_id, to_millis(Utc::now())])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn upsert_events(
    tx: &Transaction<'_>,
    source_id: &str,
    events: &[CalendarEvent],
) -> DomainResult<()> {
    let mut stmt = tx.prepare(EVENT_UPSERT_SQL).map_err(map_sql_error)?;
    for event in events {
        stmt.execute(params![source_id, event.external_id, event.title, to_millis(event.starts_at)])
            .map_err(map_sql_error)?;
    }
    Ok(())
}

fn save_state(tx: &Transaction<'_>, source_id: &str, state: &SyncState) -> DomainResult<()> {
    let cursor = i64::try_from(state.last_cursor).unwrap_or(i64::MAX);
    tx.execute(
        STATE_UPSERT_SQL,
        params![
            source_id,
            state.sync_token.as_ref().map(SyncToken::as_str),
            cursor,
            to_millis(Utc::now())
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

const STATE_GET_SQL: &str =
    "SELECT sync_token, last_cursor FROM calendar_sync_state WHERE source_id = ?1";

const STATE_UPSERT_SQL: &str =
    "INSERT INTO calendar_sync_state (source_id, sync_token, last_cursor, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(source_id) DO UPDATE SET
        sync_token = excluded.sync_token,
        last_cursor = excluded.last_cursor,
        updated_at = excluded.updated_at";

const STATE_CLEAR_TOKEN_SQL: &str =
    "UPDATE calendar_sync_state SET sync_token = NULL, last_cursor = 0, updated_at = ?2
    WHERE source_id = ?1";

const EVENT_UPSERT_SQL: &str = "INSERT INTO synced_events (source_id, external_id, title, starts_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(source_id, external_id) DO UPDATE SET
        title = excluded.title,
        starts_at = excluded.starts_at";

const EVENTS_CLEAR_SQL: &str = "DELETE FROM synced_events WHERE source_id = ?1";

const EVENTS_COUNT_SQL: &str = "SELECT COUNT(*) FROM synced_events WHERE source_id = ?1";

const EVENTS_LIST_SQL: &str = "SELECT external_id, title, starts_at
    FROM synced_events
    WHERE source_id = ?1
    ORDER BY starts_at ASC, external_id ASC";

fn map_state_row(row: &Row<'_>) -> rusqlite::Result<SyncState> {
    let token: Option<String> = row.get(0)?;
    let cursor: i64 = row.get(1)?;
    Ok(SyncState {
        sync_token: token.map(SyncToken::new),
        last_cursor: u64::try_from(cursor).unwrap_or(0),
    })
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        external_id: row.get(0)?,
        title: row.get(1)?,
        starts_at: from_millis(2, row.get(2)?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone};
    use tempfile::TempDir;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).single().expect("valid timestamp")
    }

    fn event(id: &str, title: &str) -> CalendarEvent {
        CalendarEvent { external_id: id.into(), title: title.into(), starts_at: at(0) }
    }

    fn synced(token: &str, cursor: u64) -> SyncState {
        SyncState { sync_token: Some(SyncToken::new(token)), last_cursor: cursor }
    }

    async fn setup_store() -> (SqliteSyncStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = DbManager::new(temp_dir.path().join("sync.db"), 2).expect("db created");
        db.run_migrations().expect("migrations run");
        (SqliteSyncStore::new(Arc::new(db)), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_source_loads_default_state() {
        let (store, _temp_dir) = setup_store().await;
        let state = store.load_state("primary").await.expect("load succeeds");
        assert!(!state.is_synced());
        assert_eq!(state.last_cursor, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delta_upserts_and_full_replaces() {
        let (store, _temp_dir) = setup_store().await;
        let mirrored = store
            .apply_full("primary", &[event("a", "A"), event("b", "B")], &synced("t1", 2))
            .await
            .expect("full applied");
        assert_eq!(mirrored, 2);

        let mirrored = store
            .apply_delta("primary", &[event("b", "B renamed"), event("c", "C")], &synced("t2", 4))
            .await
            .expect("delta applied");
        assert_eq!(mirrored, 3);
        assert_eq!(store.load_state("primary").await.expect("load"), synced("t2", 4));

        let mirrored = store
            .apply_full("primary", &[event("c", "C")], &synced("t3", 1))
            .await
            .expect("full applied");
        assert_eq!(mirrored, 1);
        let ids: Vec<_> = store
            .mirrored_events("primary")
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.external_id)
            .collect();
        assert_eq!(ids, vec!["c".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_token_keeps_mirror() {
        let (store, _temp_dir) = setup_store().await;
        store.apply_full("primary", &[event("a", "A")], &synced("t1", 1)).await.expect("full");

        store.clear_token("primary").await.expect("cleared");
        let state = store.load_state("primary").await.expect("load");
        assert!(state.sync_token.is_none());
        assert_eq!(store.mirrored_events("primary").await.expect("list").len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sources_are_isolated() {
        let (store, _temp_dir) = setup_store().await;
        store.apply_full("work", &[event("a", "A")], &synced("w", 1)).await.expect("work");
        store.apply_full("home", &[], &synced("h", 0)).await.expect("home");

        assert_eq!(store.mirrored_events("work").await.expect("list").len(), 1);
        assert!(store.mirrored_events("home").await.expect("list").is_empty());
    }
}
