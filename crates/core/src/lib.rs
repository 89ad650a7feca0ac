//! # Herald Core
//!
//! Pure dispatch logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for storage, ledger, delivery and calendars
//! - The per-cycle dispatch engine and poll scheduling
//! - Calendar reconciliation with full-resync recovery
//!
//! ## Architecture Principles
//! - Only depends on `herald-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod calendar;
pub mod clock;
pub mod dispatch;

// Re-export specific items to avoid ambiguity
pub use calendar::{CalendarReconciler, CalendarSource, InMemoryCalendar, SyncStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{
    CycleReport, DeliveryLedger, DeliverySink, DispatchEngine, DueItemRepository, PollSchedule,
};
