//! Periodic calendar reconciliation.
//!
//! Runs [`CalendarReconciler::reconcile`] on a fixed interval. An invalidated
//! token is handled inside the reconciler by a full resync; any other
//! failure is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use herald_core::CalendarReconciler;
use herald_domain::constants::{DEFAULT_CALENDAR_SYNC_INTERVAL_SECS, DEFAULT_JOIN_TIMEOUT_SECS};
use herald_domain::{Result as DomainResult, SyncMode, SyncOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the calendar sync worker.
#[derive(Debug, Clone)]
pub struct CalendarSyncWorkerConfig {
    /// Delay between reconciliation runs
    pub interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for CalendarSyncWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CALENDAR_SYNC_INTERVAL_SECS),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Background calendar sync with explicit lifecycle management.
pub struct CalendarSyncWorker {
    reconciler: Arc<CalendarReconciler>,
    config: CalendarSyncWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl CalendarSyncWorker {
    pub fn new(reconciler: Arc<CalendarReconciler>, config: CalendarSyncWorkerConfig) -> Self {
        Self { reconciler, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Run one reconciliation immediately, outside the background loop.
    pub async fn sync_now(&self) -> DomainResult<SyncOutcome> {
        self.reconciler.reconcile().await
    }

    #[instrument(skip(self), fields(source_id = %self.reconciler.source_id()))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let reconciler = Arc::clone(&self.reconciler);
        let interval = self.config.interval;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(reconciler, interval, cancel).await;
        });

        self.task_handle = Some(handle);
        info!(interval_secs = interval.as_secs(), "Calendar sync worker started");
        Ok(())
    }

    #[instrument(skip(self), fields(source_id = %self.reconciler.source_id()))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "Calendar sync task panicked");
                    return Err(SchedulerError::TaskPanicked(e.to_string()));
                }
                Err(_) => {
                    warn!("Calendar sync task did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        info!("Calendar sync worker stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_loop(
        reconciler: Arc<CalendarReconciler>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Calendar sync loop cancelled");
                    break;
                }
                result = reconciler.reconcile() => log_outcome(result),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Calendar sync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

fn log_outcome(result: DomainResult<SyncOutcome>) {
    match result {
        Ok(outcome) if outcome.mode == SyncMode::Resync => {
            info!(
                received = outcome.received,
                mirrored = outcome.mirrored,
                "Calendar resynced after token invalidation"
            );
        }
        Ok(outcome) => {
            debug!(
                mode = ?outcome.mode,
                received = outcome.received,
                mirrored = outcome.mirrored,
                "Calendar sync finished"
            );
        }
        Err(e) => {
            warn!(error = %e, "Calendar sync failed; retrying next interval");
        }
    }
}

impl Drop for CalendarSyncWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("CalendarSyncWorker dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
