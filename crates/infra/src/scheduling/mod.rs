//! Background workers for dispatch and calendar sync
//!
//! Every worker follows the same lifecycle rules:
//! - Explicit `start`/`stop`
//! - Join handles tracked for spawned tasks
//! - Cancellation token aborts sleeps immediately
//! - `stop` waits for the task under a join timeout

pub mod calendar_sync_worker;
pub mod dispatch_worker;
pub mod error;
pub mod supervisor;

pub use calendar_sync_worker::{CalendarSyncWorker, CalendarSyncWorkerConfig};
pub use dispatch_worker::{DispatchWorker, DispatchWorkerConfig};
pub use error::{SchedulerError, SchedulerResult};
pub use supervisor::{DispatchPorts, DispatchSupervisor};
