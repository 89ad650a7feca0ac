//! SQLite-backed reminder storage.
//!
//! Completion is an in-place `is_done` flip guarded by `is_done = 0`, so a
//! repeated or racing commit changes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::DueItemRepository;
use herald_domain::{Destination, DueItem, DueItemId, ItemKind, Reminder, Result as DomainResult};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::manager::{DbManager, SqliteConnection};
use super::util::{
    from_millis, int_to_bool, limit_param, map_join_error, map_sql_error, to_millis,
};

/// Reminder repository over the shared pool.
pub struct SqliteReminderRepository {
    db: Arc<DbManager>,
}

impl SqliteReminderRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert a pending reminder and return its id.
    pub async fn create_reminder(
        &self,
        owner: Destination,
        message: &str,
        remind_at: DateTime<Utc>,
    ) -> DomainResult<DueItemId> {
        let db = Arc::clone(&self.db);
        let message = message.to_string();

        task::spawn_blocking(move || -> DomainResult<DueItemId> {
            let conn = db.get_connection()?;
            conn.execute(
                REMINDER_INSERT_SQL,
                params![owner.0, message, to_millis(remind_at), to_millis(Utc::now())],
            )
            .map_err(map_sql_error)?;
            Ok(DueItemId(conn.last_insert_rowid()))
        })
        .await
        .map_err(map_join_error)?
    }

    /// Fetch one reminder regardless of state.
    pub async fn get_reminder(&self, id: DueItemId) -> DomainResult<Option<Reminder>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Reminder>> {
            let conn = db.get_connection()?;
            conn.query_row(REMINDER_GET_SQL, params![id.0], map_reminder_row)
                .optional()
                .map_err(map_sql_error)
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

        let mut stmt = conn.prepare(REMINDER_LIST_DUE_SQL).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![to_millis(before), limit_param(limit)], map_reminder_row)
            .map_err(map_sql_error)?;
        let items = rows
            .map(|row| row.map(DueItem::Reminder).map_err(map_sql_error))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(items)
    }

    fn flag_done(conn: &mut SqliteConnection, ids: &[DueItemId]) -> DomainResult<usize> {
        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(REMINDER_MARK_DONE_SQL).map_err(map_sql_error)?;
            for id in ids {
                changed += stmt.execute(params![id.0]).map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(changed)
    }
}

#[async_trait]
impl DueItemRepository for SqliteReminderRepository {
    fn kind(&self) -> ItemKind {
        ItemKind::Reminder
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

    async fn mark_done(&self, ids: &[DueItemId]) -> DomainResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let db = Arc::clone(&self.db);
        let ids = ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let mut conn = db.get_connection()?;
            Self::flag_done(&mut conn, &ids)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, id: DueItemId) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let removed =
                conn.execute(REMINDER_DELETE_SQL, params![id.0]).map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }
}

const REMINDER_INSERT_SQL: &str = "INSERT INTO reminders (owner_id, message, remind_at, is_done, created_at)
    VALUES (?1, ?2, ?3, 0, ?4)";

const REMINDER_GET_SQL: &str = "SELECT id, owner_id, message, remind_at, is_done
    FROM reminders
    WHERE id = ?1";

const REMINDER_LIST_DUE_SQL: &str = "SELECT id, owner_id, message, remind_at, is_done
    FROM reminders
    WHERE is_done = 0 AND remind_at <= ?1
    ORDER BY remind_at ASC, id ASC
    LIMIT ?2";

const REMINDER_MARK_DONE_SQL: &str = "UPDATE reminders SET is_done = 1 WHERE id = ?1 AND is_done = 0";

const REMINDER_DELETE_SQL: &str = "DELETE FROM reminders WHERE id = ?1";

fn map_reminder_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: DueItemId(row.get(0)?),
        owner: Destination(row.get(1)?),
        message: row.get(2)?,
        remind_at: from_millis(3, row.get(3)?)?,
        done: int_to_bool(row.get(4)?),
    })
}
