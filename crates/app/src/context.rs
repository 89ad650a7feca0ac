//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use herald_core::{CalendarReconciler, DeliverySink, InMemoryCalendar, SystemClock};
use herald_domain::{Config, ItemKind, Result};
use herald_infra::{
    sink_from_config, CalendarSyncWorker, CalendarSyncWorkerConfig, DbManager, DispatchPorts,
    DispatchStats, DispatchSupervisor, SqliteAlarmRepository, SqliteDeliveryLedger,
    SqliteReminderRepository, SqliteSyncStore, SqliteTriggerRepository,
};
use tracing::{info, instrument, warn};

/// Owns the storage ports, the delivery sink and every background worker.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub reminders: Arc<SqliteReminderRepository>,
    pub alarms: Arc<SqliteAlarmRepository>,
    pub triggers: Arc<SqliteTriggerRepository>,
    pub ledger: Arc<SqliteDeliveryLedger>,
    pub sync_store: Arc<SqliteSyncStore>,
    supervisor: DispatchSupervisor,
    calendar: Option<Arc<InMemoryCalendar>>,
    calendar_worker: Option<CalendarSyncWorker>,
}

impl AppContext {
    /// Build the context with the sink selected by `config.telegram`.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or migrated, or the sink
    /// configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let sink = sink_from_config(&config.telegram)?;
        Self::with_sink(config, sink)
    }

    /// Build the context around an explicit delivery sink.
    pub fn with_sink(config: Config, sink: Arc<dyn DeliverySink>) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let reminders = Arc::new(SqliteReminderRepository::new(Arc::clone(&db)));
        let alarms = Arc::new(SqliteAlarmRepository::new(Arc::clone(&db)));
        let triggers = Arc::new(SqliteTriggerRepository::new(Arc::clone(&db)));
        let ledger = Arc::new(SqliteDeliveryLedger::new(Arc::clone(&db)));
        let sync_store = Arc::new(SqliteSyncStore::new(Arc::clone(&db)));

        let ports = DispatchPorts {
            reminders: reminders.clone(),
            alarms: alarms.clone(),
            triggers: triggers.clone(),
            ledger: ledger.clone(),
            sink,
            clock: Arc::new(SystemClock),
        };
        let supervisor = DispatchSupervisor::new(&config.dispatch, &ports);

        let (calendar, calendar_worker) = if config.calendar.enabled {
            let calendar = Arc::new(InMemoryCalendar::new());
            let reconciler = CalendarReconciler::new(
                calendar.clone(),
                sync_store.clone(),
                config.calendar.source_id.clone(),
            );
            let worker = CalendarSyncWorker::new(
                Arc::new(reconciler),
                CalendarSyncWorkerConfig {
                    interval: Duration::from_secs(config.calendar.interval_secs),
                    ..Default::default()
                },
            );
            (Some(calendar), Some(worker))
        } else {
            (None, None)
        };

        info!(
            db_path = %config.database.path,
            dispatch_enabled = config.dispatch.enabled,
            calendar_enabled = config.calendar.enabled,
            "Application context initialised"
        );

        Ok(Self {
            config,
            db,
            reminders,
            alarms,
            triggers,
            ledger,
            sync_store,
            supervisor,
            calendar,
            calendar_worker,
        })
    }

    /// Start the dispatch loops (when enabled) and the calendar worker.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        let loops = self.supervisor.start_all().await?;
        if let Some(worker) = self.calendar_worker.as_mut() {
            if let Err(err) = worker.start().await {
                if let Err(stop_err) = self.supervisor.stop_all().await {
                    warn!(error = %stop_err, "Dispatch loops did not stop after failed start");
                }
                return Err(err.into());
            }
        }
        info!(dispatch_loops = loops, "Workers started");
        Ok(())
    }

    /// Stop every running worker. The calendar worker is stopped even when a
    /// dispatch loop fails to stop; the first failure is returned.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        let dispatch = self.supervisor.stop_all().await;

        let calendar = match self.calendar_worker.as_mut() {
            Some(worker) if worker.is_running() => worker.stop().await,
            _ => Ok(()),
        };

        if let Err(e) = &calendar {
            warn!(error = %e, "Calendar sync worker did not stop cleanly");
        }

        dispatch?;
        calendar?;
        info!("Shutdown complete");
        Ok(())
    }

    /// Verify the database answers queries.
    pub fn health_check(&self) -> Result<()> {
        self.db.health_check()
    }

    pub fn running_loops(&self) -> usize {
        self.supervisor.running()
    }

    pub fn dispatch_stats(&self) -> Vec<(ItemKind, DispatchStats)> {
        self.supervisor.stats()
    }

    /// Local calendar source fed by front ends, present when calendar sync
    /// is enabled.
    pub fn calendar(&self) -> Option<Arc<InMemoryCalendar>> {
        self.calendar.clone()
    }
}
