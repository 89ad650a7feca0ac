//! SQLite delivery ledger.
//!
//! One row per delivered dedupe key, shared by every item kind. Inserts
//! ignore keys that are already present, so recording twice is harmless.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::DeliveryLedger;
use herald_domain::{DedupeKey, ItemKind, Result as DomainResult};
use rusqlite::params;
use tokio::task;

use super::manager::{DbManager, SqliteConnection};
use super::util::{i64_to_usize, map_join_error, map_sql_error, to_millis};

/// Delivery ledger backed by the `delivery_ledger` table.
pub struct SqliteDeliveryLedger {
    db: Arc<DbManager>,
}

impl SqliteDeliveryLedger {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Number of recorded deliveries, optionally restricted to one kind.
    pub async fn count(&self, kind: Option<ItemKind>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let count: i64 = match kind {
                Some(kind) => conn
                    .query_row(LEDGER_COUNT_KIND_SQL, params![kind.as_str()], |row| row.get(0))
                    .map_err(map_sql_error)?,
                None => conn
                    .query_row(LEDGER_COUNT_SQL, [], |row| row.get(0))
                    .map_err(map_sql_error)?,
            };
            Ok(i64_to_usize(count))
        })
        .await
        .map_err(map_join_error)?
    }

    fn insert_keys(
        conn: &mut SqliteConnection,
        kind: ItemKind,
        keys: &[DedupeKey],
    ) -> DomainResult<usize> {
        let delivered_at = to_millis(Utc::now());
        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(LEDGER_INSERT_SQL).map_err(map_sql_error)?;
            for key in keys {
                inserted += stmt
                    .execute(params![key.as_str(), kind.as_str(), delivered_at])
                    .map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(inserted)
    }

    fn select_present(
        conn: &SqliteConnection,
        keys: &[DedupeKey],
    ) -> DomainResult<HashSet<DedupeKey>> {
        let mut stmt = conn.prepare(LEDGER_EXISTS_SQL).map_err(map_sql_error)?;
        let mut present = HashSet::new();
        for key in keys {
            if stmt.exists(params![key.as_str()]).map_err(map_sql_error)? {
                present.insert(key.clone());
            }
        }
        Ok(present)
    }
}

#[async_trait]
impl DeliveryLedger for SqliteDeliveryLedger {
    async fn record_delivered(&self, kind: ItemKind, keys: &[DedupeKey]) -> DomainResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let db = Arc::clone(&self.db);
        let keys = keys.to_vec();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let mut conn = db.get_connection()?;
            Self::insert_keys(&mut conn, kind, &keys)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delivered_among(&self, keys: &[DedupeKey]) -> DomainResult<HashSet<DedupeKey>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let db = Arc::clone(&self.db);
        let keys = keys.to_vec();

        task::spawn_blocking(move || -> DomainResult<HashSet<DedupeKey>> {
            let conn = db.get_connection()?;
            Self::select_present(&conn, &keys)
        })
        .await
        .map_err(map_join_error)?
    }
}

const LEDGER_INSERT_SQL: &str = "INSERT INTO delivery_ledger (dedupe_key, item_kind, delivered_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(dedupe_key) DO NOTHING";

const LEDGER_EXISTS_SQL: &str = "SELECT 1 FROM delivery_ledger WHERE dedupe_key = ?1";

const LEDGER_COUNT_SQL: &str = "SELECT COUNT(*) FROM delivery_ledger";

const LEDGER_COUNT_KIND_SQL: &str = "SELECT COUNT(*) FROM delivery_ledger WHERE item_kind = ?1";
