//! Background loop that runs dispatch cycles for one item kind.
//!
//! Each iteration runs one [`DispatchEngine`] cycle and then sleeps for the
//! poll interval plus a random jitter. The join handle is tracked,
//! cancellation is explicit, and `stop()` waits for the task under a
//! timeout. A stop request aborts the sleep at once; an in-flight delivery
//! is allowed to finish and its result is committed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use herald_core::{DispatchEngine, PollSchedule};
//! use herald_infra::scheduling::{DispatchWorker, DispatchWorkerConfig, SchedulerResult};
//!
//! # async fn example(engine: DispatchEngine) -> SchedulerResult<()> {
//! let mut worker = DispatchWorker::new(
//!     Arc::new(engine),
//!     DispatchWorkerConfig {
//!         schedule: PollSchedule::new(Duration::from_secs(60), Duration::from_secs(5)),
//!         ..Default::default()
//!     },
//! );
//!
//! worker.start().await?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use herald_core::{DispatchEngine, PollSchedule};
use herald_domain::constants::{
    DEFAULT_JITTER_SECS, DEFAULT_JOIN_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS,
};
use herald_domain::ItemKind;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::log_metric;
use crate::observability::metrics::DispatchMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for a dispatch worker.
#[derive(Debug, Clone)]
pub struct DispatchWorkerConfig {
    /// Delay between cycles
    pub schedule: PollSchedule,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for DispatchWorkerConfig {
    fn default() -> Self {
        Self {
            schedule: PollSchedule::new(
                Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
                Duration::from_secs(DEFAULT_JITTER_SECS),
            ),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Dispatch loop with explicit lifecycle management.
pub struct DispatchWorker {
    engine: Arc<DispatchEngine>,
    config: DispatchWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    metrics: Arc<DispatchMetrics>,
}

impl DispatchWorker {
    pub fn new(engine: Arc<DispatchEngine>, config: DispatchWorkerConfig) -> Self {
        Self {
            engine,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.engine.kind()
    }

    /// Counters fed by this worker's cycles.
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawn the background loop. The first cycle runs immediately.
    #[instrument(skip(self), fields(kind = %self.kind()))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let engine = Arc::clone(&self.engine);
        let schedule = self.config.schedule;
        let cancel = self.cancellation.clone();
        let metrics = Arc::clone(&self.metrics);

        let handle = tokio::spawn(async move {
            Self::process_loop(engine, schedule, cancel, metrics).await;
        });

        self.task_handle = Some(handle);
        info!(
            poll_interval_secs = self.config.schedule.poll_interval().as_secs(),
            jitter_secs = self.config.schedule.jitter().as_secs(),
            "Dispatch worker started"
        );
        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    #[instrument(skip(self), fields(kind = %self.kind()))]
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
                    warn!(error = %e, "Dispatch worker task panicked");
                    return Err(SchedulerError::TaskPanicked(e.to_string()));
                }
                Err(_) => {
                    warn!("Dispatch worker did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        info!("Dispatch worker stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true while the background task is owned by this worker.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_loop(
        engine: Arc<DispatchEngine>,
        schedule: PollSchedule,
        cancel: CancellationToken,
        metrics: Arc<DispatchMetrics>,
    ) {
        let kind = engine.kind();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            Self::run_once(&engine, &cancel, &metrics).await;

            let delay = schedule.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(kind = %kind, "Dispatch loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_once(
        engine: &DispatchEngine,
        cancel: &CancellationToken,
        metrics: &DispatchMetrics,
    ) {
        let kind = engine.kind();
        let started = Instant::now();

        match engine.run_cycle(cancel).await {
            Ok(report) => {
                if report.fetched > 0 {
                    debug!(
                        kind = %kind,
                        fetched = report.fetched,
                        delivered = report.delivered,
                        failed = report.failed,
                        skipped = report.skipped,
                        "Dispatch cycle finished"
                    );
                }
                log_metric(
                    metrics.record_cycle(&report, started.elapsed()),
                    "dispatch_worker.cycle",
                );
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "Dispatch cycle could not read due items");
                log_metric(metrics.record_fetch_error(), "dispatch_worker.fetch_error");
            }
        }
    }
}

impl Drop for DispatchWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(kind = %self.kind(), "DispatchWorker dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
