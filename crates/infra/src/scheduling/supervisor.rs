//! Owns the three dispatch loops.
//!
//! The supervisor builds one [`DispatchWorker`] per item kind from
//! [`DispatchSettings`] and starts them only when dispatch is enabled. The
//! loops share the ledger, sink and clock but run independently.

use std::sync::Arc;

use futures::future::join_all;
use herald_core::{
    Clock, DeliveryLedger, DeliverySink, DispatchEngine, DueItemRepository, PollSchedule,
};
use herald_domain::{Destination, DispatchSettings, ItemKind};
use tracing::{info, instrument, warn};

use crate::observability::metrics::{DispatchMetrics, DispatchStats};
use crate::scheduling::dispatch_worker::{DispatchWorker, DispatchWorkerConfig};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Collaborators shared by every dispatch loop.
#[derive(Clone)]
pub struct DispatchPorts {
    pub reminders: Arc<dyn DueItemRepository>,
    pub alarms: Arc<dyn DueItemRepository>,
    pub triggers: Arc<dyn DueItemRepository>,
    pub ledger: Arc<dyn DeliveryLedger>,
    pub sink: Arc<dyn DeliverySink>,
    pub clock: Arc<dyn Clock>,
}

impl DispatchPorts {
    fn repository(&self, kind: ItemKind) -> Arc<dyn DueItemRepository> {
        match kind {
            ItemKind::Reminder => Arc::clone(&self.reminders),
            ItemKind::Alarm => Arc::clone(&self.alarms),
            ItemKind::Trigger => Arc::clone(&self.triggers),
        }
    }
}

/// Starts and stops the per-kind dispatch workers together.
pub struct DispatchSupervisor {
    enabled: bool,
    workers: Vec<DispatchWorker>,
}

impl DispatchSupervisor {
    pub fn new(settings: &DispatchSettings, ports: &DispatchPorts) -> Self {
        let workers = ItemKind::ALL
            .into_iter()
            .map(|kind| {
                let loop_settings = settings.for_kind(kind);
                let mut engine = DispatchEngine::new(
                    ports.repository(kind),
                    Arc::clone(&ports.ledger),
                    Arc::clone(&ports.sink),
                    Arc::clone(&ports.clock),
                )
                .with_batch_limit(loop_settings.batch_limit);
                if kind == ItemKind::Alarm {
                    engine = engine.with_broadcast(settings.notify_channel_id.map(Destination));
                }

                DispatchWorker::new(
                    Arc::new(engine),
                    DispatchWorkerConfig {
                        schedule: PollSchedule::new(
                            loop_settings.poll_interval(),
                            loop_settings.jitter(),
                        ),
                        ..Default::default()
                    },
                )
            })
            .collect();

        Self { enabled: settings.enabled, workers }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start every loop. Returns the number of loops started, zero when
    /// dispatch is disabled.
    ///
    /// If a loop fails to start, the loops started by this call are stopped
    /// again before the error is returned.
    #[instrument(skip(self))]
    pub async fn start_all(&mut self) -> SchedulerResult<usize> {
        if !self.enabled {
            info!("Dispatch disabled; no loops started");
            return Ok(0);
        }

        for index in 0..self.workers.len() {
            if let Err(err) = self.workers[index].start().await {
                warn!(
                    kind = %self.workers[index].kind(),
                    error = %err,
                    "Dispatch loop failed to start; stopping loops already started"
                );
                for started in &mut self.workers[..index] {
                    if let Err(stop_err) = started.stop().await {
                        warn!(kind = %started.kind(), error = %stop_err, "Rollback stop failed");
                    }
                }
                return Err(err);
            }
        }

        info!(loops = self.workers.len(), "Dispatch loops started");
        Ok(self.workers.len())
    }

    /// Stop every running loop concurrently. All loops are asked to stop
    /// even if one fails; the first failure is returned.
    #[instrument(skip(self))]
    pub async fn stop_all(&mut self) -> SchedulerResult<()> {
        let results = join_all(
            self.workers.iter_mut().filter(|w| w.is_running()).map(|w| w.stop()),
        )
        .await;

        let mut first_error: Option<SchedulerError> = None;
        for err in results.into_iter().filter_map(Result::err) {
            warn!(error = %err, "Dispatch loop did not stop cleanly");
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Dispatch loops stopped");
                Ok(())
            }
        }
    }

    pub fn running(&self) -> usize {
        self.workers.iter().filter(|w| w.is_running()).count()
    }

    pub fn metrics(&self, kind: ItemKind) -> Option<Arc<DispatchMetrics>> {
        self.workers.iter().find(|w| w.kind() == kind).map(DispatchWorker::metrics)
    }

    /// Counters for every loop, in start order.
    pub fn stats(&self) -> Vec<(ItemKind, DispatchStats)> {
        self.workers.iter().map(|w| (w.kind(), w.metrics().snapshot())).collect()
    }
}
