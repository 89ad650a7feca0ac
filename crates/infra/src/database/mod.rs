//! SQLite adapters for the storage ports

pub mod alarm_repository;
pub mod ledger_repository;
pub mod manager;
pub mod reminder_repository;
pub mod sync_store;
pub mod trigger_repository;
mod util;

pub use alarm_repository::SqliteAlarmRepository;
pub use ledger_repository::SqliteDeliveryLedger;
pub use manager::{DbManager, SqliteConnection, SqlitePool};
pub use reminder_repository::SqliteReminderRepository;
pub use sync_store::SqliteSyncStore;
pub use trigger_repository::SqliteTriggerRepository;
