//! External calendar sync: source/store ports, in-memory source, reconciler

pub mod memory;
pub mod ports;
pub mod reconciler;

pub use memory::InMemoryCalendar;
pub use ports::{CalendarSource, SyncStore};
pub use reconciler::CalendarReconciler;
