//! SQLite-backed calendar alarm storage.
//!
//! Alarms have no done flag; delivery completes by deleting the row. The
//! due query joins the referenced event to resolve the message title.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::DueItemRepository;
use herald_domain::{Alarm, Destination, DueItem, DueItemId, ItemKind, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{DbManager, SqliteConnection};
use super::util::{from_millis, limit_param, map_join_error, map_sql_error, to_millis};

/// Alarm and calendar event repository over the shared pool.
pub struct SqliteAlarmRepository {
    db: Arc<DbManager>,
}

impl SqliteAlarmRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a calendar event and return its id.
    pub async fn create_event(
        &self,
        owner: Destination,
        title: &str,
        starts_at: DateTime<Utc>,
    ) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);
        let title = title.to_string();

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            conn.execute(EVENT_INSERT_SQL, params![owner.0, title, to_millis(starts_at)])
                .map_err(map_sql_error)?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_join_error)?
    }

    /// Remove a calendar event. Alarms pointing at it stay and fall back to
    /// the default title.
    pub async fn delete_event(&self, event_id: i64) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let removed =
                conn.execute(EVENT_DELETE_SQL, params![event_id]).map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Schedule an alarm for an event.
    pub async fn create_alarm(
        &self,
        owner: Destination,
        event_id: i64,
        notify_at: DateTime<Utc>,
    ) -> DomainResult<DueItemId> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<DueItemId> {
            let conn = db.get_connection()?;
            conn.execute(ALARM_INSERT_SQL, params![owner.0, event_id, to_millis(notify_at)])
                .map_err(map_sql_error)?;
            Ok(DueItemId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_join_error)?
    }

    /// Number of alarms still stored.
    pub async fn count_alarms(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM calendar_alarms", [], |row| row.get(0))
                .map_err(map_sql_error)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }

    fn fetch_due(
        conn: &SqliteConnection,
        before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> DomainResult<Vec<DueItem>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(ALARM_LIST_DUE_SQL).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![to_millis(before), limit_param(limit)], map_alarm_row)
            .map_err(map_sql_error)?;
        let items = rows
            .map(|row| row.map(DueItem::Alarm).map_err(map_sql_error))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(items)
    }

    fn delete_many(conn: &mut SqliteConnection, ids: &[DueItemId]) -> DomainResult<usize> {
        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(ALARM_DELETE_SQL).map_err(map_sql_error)?;
            for id in ids {
                removed += stmt.execute(params![id.0]).map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(removed)
    }
}

#[async_trait]
impl DueItemRepository for SqliteAlarmRepository {
    fn kind(&self) -> ItemKind {
        ItemKind::Alarm
    }

    async fn list_due(
        &self,
        before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> DomainResult<Vec<DueItem>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<DueItem>> {
            let conn = db.get_connection()?;
            Self::fetch_due(&conn, before, limit)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Alarms carry no flag, so marking done removes the rows.
    async fn mark_done(&self, ids: &[DueItemId]) -> DomainResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let db = Arc::clone(&self.db);
        let ids = ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let mut conn = db.get_connection()?;
            Self::delete_many(&mut conn, &ids)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, id: DueItemId) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let removed = conn.execute(ALARM_DELETE_SQL, params![id.0]).map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }
}

const EVENT_INSERT_SQL: &str =
    "INSERT INTO calendar_events (owner_id, title, starts_at) VALUES (?1, ?2, ?3)";

const EVENT_DELETE_SQL: &str = "DELETE FROM calendar_events WHERE id = ?1";

const ALARM_INSERT_SQL: &str =
    "INSERT INTO calendar_alarms (owner_id, event_id, notify_at) VALUES (?1, ?2, ?3)";

const ALARM_LIST_DUE_SQL: &str = "SELECT a.id, a.owner_id, a.event_id, e.title, a.notify_at
    FROM calendar_alarms a
    LEFT JOIN calendar_events e ON e.id = a.event_id
    WHERE a.notify_at <= ?1
    ORDER BY a.notify_at ASC, a.id ASC
    LIMIT ?2";

const ALARM_DELETE_SQL: &str = "DELETE FROM calendar_alarms WHERE id = ?1";

fn map_alarm_row(row: &Row<'_>) -> rusqlite::Result<Alarm> {
    Ok(Alarm {
        id: DueItemId(row.get(0)?),
        owner: Destination(row.get(1)?),
        event_id: row.get(2)?,
        event_title: row.get(3)?,
        notify_at: from_millis(4, row.get(4)?)?,
    })
}
