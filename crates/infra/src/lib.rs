//! # Herald Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for reminders, alarms and triggers
//! - The delivery ledger and calendar mirror stores
//! - Delivery sinks (Telegram Bot API, logging)
//! - Background dispatch and calendar sync workers
//! - Configuration loading and dispatch metrics
//!
//! ## Architecture
//! - Implements traits defined in `herald-core`
//! - Depends on `herald-domain` and `herald-core`
//! - Contains all "impure" code (I/O, network, timers)

pub mod config;
pub mod database;
pub mod delivery;
pub mod errors;
pub mod observability;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use delivery::{sink_from_config, LoggingSink, TelegramSink};
pub use errors::{delivery_error_from_http, InfraError};
pub use observability::metrics::{DispatchMetrics, DispatchStats};
pub use scheduling::*;
