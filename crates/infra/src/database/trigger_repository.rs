//! SQLite-backed project trigger storage.
//!
//! Each trigger row is one scheduled firing of a rule, routed to a channel
//! row. Due rows are listed whether or not their key is in the ledger; the
//! dispatch engine completes ledgered rows without sending, which removes a
//! row left behind by a failed delete.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::DueItemRepository;
use herald_domain::{
    DedupeKey, Destination, DueItem, DueItemId, HeraldError, ItemKind, Result as DomainResult,
    Trigger, TriggerRule,
};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::warn;

use super::manager::{DbManager, SqliteConnection};
use super::util::{from_millis, limit_param, map_join_error, map_sql_error, to_millis};

/// Trigger and channel repository over the shared pool.
pub struct SqliteTriggerRepository {
    db: Arc<DbManager>,
}

impl SqliteTriggerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Register a chat as a delivery channel, returning the channel row id.
    /// Registering the same chat twice returns the existing row.
    pub async fn upsert_channel(&self, chat: Destination) -> DomainResult<i64> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<i64> {
            let conn = db.get_connection()?;
            Self::upsert_channel_row(&conn, chat)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Schedule one firing of `rule_ref` at `fire_at` on `chat`.
    ///
    /// The stored dedupe key is derived from the rule reference and fire
    /// time; scheduling the same firing twice is rejected by the unique key.
    pub async fn create_trigger(
        &self,
        rule_ref: &str,
        rule: &TriggerRule,
        chat: Destination,
        fire_at: DateTime<Utc>,
    ) -> DomainResult<DueItemId> {
        let key = DedupeKey::for_firing(rule_ref, fire_at);
        let rule_json = serde_json::to_string(rule)
            .map_err(|e| HeraldError::InvalidInput(format!("trigger rule: {e}")))?;
        self.insert_trigger(key, rule_json, chat, fire_at).await
    }

    /// Insert a trigger with a raw rule payload. Used to store rules written
    /// by older clients verbatim.
    pub async fn create_trigger_raw(
        &self,
        key: DedupeKey,
        rule_payload: &str,
        chat: Destination,
        fire_at: DateTime<Utc>,
    ) -> DomainResult<DueItemId> {
        self.insert_trigger(key, rule_payload.to_string(), chat, fire_at).await
    }

    /// Upsert the channel and insert the trigger row in one transaction.
    async fn insert_trigger(
        &self,
        key: DedupeKey,
        payload: String,
        chat: Destination,
        fire_at: DateTime<Utc>,
    ) -> DomainResult<DueItemId> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<DueItemId> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let channel_id = Self::upsert_channel_row(&tx, chat)?;
            tx.execute(
                TRIGGER_INSERT_SQL,
                params![key.as_str(), payload, channel_id, to_millis(fire_at)],
            )
            .map_err(map_sql_error)?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(map_sql_error)?;
            Ok(DueItemId(id))
        })
        .await
        .map_err(map_join_error)?
    }

    /// Fetch one trigger by id.
    pub async fn get_trigger(&self, id: DueItemId) -> DomainResult<Option<Trigger>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Trigger>> {
            let conn = db.get_connection()?;
            conn.query_row(TRIGGER_GET_SQL, params![id.0], map_trigger_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    fn upsert_channel_row(conn: &rusqlite::Connection, chat: Destination) -> DomainResult<i64> {
        conn.execute(CHANNEL_UPSERT_SQL, params![chat.0]).map_err(map_sql_error)?;
        conn.query_row(CHANNEL_ID_SQL, params![chat.0], |row| row.get(0)).map_err(map_sql_error)
    }

    fn fetch_due(
        conn: &SqliteConnection,
        before: DateTime<Utc>,
        limit: Option<usize>,
    ) -> DomainResult<Vec<DueItem>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(TRIGGER_LIST_DUE_SQL).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![to_millis(before), limit_param(limit)], map_trigger_row)
            .map_err(map_sql_error)?;
        let items = rows
            .map(|row| row.map(DueItem::Trigger).map_err(map_sql_error))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(items)
    }

    fn delete_many(conn: &mut SqliteConnection, ids: &[DueItemId]) -> DomainResult<usize> {
        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(TRIGGER_DELETE_SQL).map_err(map_sql_error)?;
            for id in ids {
                removed += stmt.execute(params![id.0]).map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(removed)
    }
}

#[async_trait]
impl DueItemRepository for SqliteTriggerRepository {
    fn kind(&self) -> ItemKind {
        ItemKind::Trigger
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

    /// Triggers carry no flag, so marking done removes the rows.
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
            let removed =
                conn.execute(TRIGGER_DELETE_SQL, params![id.0]).map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }
}

const CHANNEL_UPSERT_SQL: &str =
    "INSERT INTO channels (kind, chat_id) VALUES ('telegram', ?1) ON CONFLICT(chat_id) DO NOTHING";

const CHANNEL_ID_SQL: &str = "SELECT id FROM channels WHERE chat_id = ?1";

const TRIGGER_INSERT_SQL: &str =
    "INSERT INTO triggers (dedupe_key, rule, channel_id, next_fire_at) VALUES (?1, ?2, ?3, ?4)";

const TRIGGER_GET_SQL: &str = "SELECT t.id, t.dedupe_key, t.rule, c.chat_id, t.next_fire_at
    FROM triggers t
    JOIN channels c ON c.id = t.channel_id
    WHERE t.id = ?1";

const TRIGGER_LIST_DUE_SQL: &str = "SELECT t.id, t.dedupe_key, t.rule, c.chat_id, t.next_fire_at
    FROM triggers t
    JOIN channels c ON c.id = t.channel_id
    WHERE t.next_fire_at <= ?1
    ORDER BY t.next_fire_at ASC, t.id ASC
    LIMIT ?2";

const TRIGGER_DELETE_SQL: &str = "DELETE FROM triggers WHERE id = ?1";

fn map_trigger_row(row: &Row<'_>) -> rusqlite::Result<Trigger> {
    let id = DueItemId(row.get(0)?);
    let payload: String = row.get(2)?;
    Ok(Trigger {
        id,
        dedupe_key: DedupeKey::new(row.get::<_, String>(1)?),
        rule: parse_rule(id, &payload),
        channel: Destination(row.get(3)?),
        next_fire_at: from_millis(4, row.get(4)?)?,
    })
}

/// Rules are stored as JSON. A payload that does not parse is delivered
/// as plain text so a malformed rule still reaches its channel.
fn parse_rule(id: DueItemId, payload: &str) -> TriggerRule {
    serde_json::from_str(payload).unwrap_or_else(|err| {
        warn!(trigger_id = %id, error = %err, "Trigger rule is not valid JSON; sending raw text");
        TriggerRule { text: payload.to_string(), silent: false }
    })
}
