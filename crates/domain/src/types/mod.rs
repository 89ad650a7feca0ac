//! Domain types and models

pub mod due_item;
pub mod sync;

pub use due_item::{
    Alarm, Completion, DedupeKey, Destination, DueItem, DueItemId, ItemKind, Reminder, TextFormat,
    Trigger, TriggerRule,
};
pub use sync::{
    CalendarEvent, IncrementalSync, SyncBatch, SyncMode, SyncOutcome, SyncState, SyncToken,
};
