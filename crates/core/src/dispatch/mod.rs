//! Due-item dispatch: ports, the per-cycle engine and poll scheduling

pub mod engine;
pub mod ports;
pub mod schedule;

pub use engine::{CycleReport, DispatchEngine};
pub use ports::{DeliveryLedger, DeliverySink, DueItemRepository};
pub use schedule::PollSchedule;
