#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::DeliverySink;
use herald_domain::{DeliveryError, Destination};
use herald_infra::database::DbManager;
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a migrated database in a fresh temp directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("herald-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed reference instant used by dispatch tests.
pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_760_000_000, 0).expect("valid timestamp")
}

/// Sink that records every send and refuses destinations marked as failing.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Destination, String, bool)>>,
    failing: Mutex<HashSet<Destination>>,
}

impl RecordingSink {
    pub fn fail_for(&self, destination: Destination) {
        self.failing.lock().unwrap().insert(destination);
    }

    pub fn recover(&self, destination: Destination) {
        self.failing.lock().unwrap().remove(&destination);
    }

    pub fn sent(&self) -> Vec<(Destination, String, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        silent: bool,
    ) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&destination) {
            return Err(DeliveryError::Rejected {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().unwrap().push((destination, text.to_string(), silent));
        Ok(())
    }
}
