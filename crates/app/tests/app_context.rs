//! Application wiring: workers started from config deliver and sync.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_app::AppContext;
use herald_core::{DeliverySink, SyncStore};
use herald_domain::{
    CalendarEvent, CalendarSyncConfig, Config, DatabaseConfig, DeliveryError, Destination,
    DispatchSettings, ItemKind, LoopSettings,
};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink(Mutex<Vec<(Destination, String)>>);

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(
        &self,
        destination: Destination,
        text: &str,
        _silent: bool,
    ) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push((destination, text.to_string()));
        Ok(())
    }
}

fn config(dir: &TempDir, dispatch_enabled: bool, calendar_enabled: bool) -> Config {
    let fast = LoopSettings { poll_interval_secs: 1, jitter_secs: 0, batch_limit: None };
    Config {
        database: DatabaseConfig {
            path: dir.path().join("herald.db").to_string_lossy().into_owned(),
            pool_size: 4,
        },
        dispatch: DispatchSettings {
            enabled: dispatch_enabled,
            reminders: fast.clone(),
            alarms: fast.clone(),
            triggers: fast,
            notify_channel_id: None,
        },
        calendar: CalendarSyncConfig {
            enabled: calendar_enabled,
            interval_secs: 1,
            source_id: "team".into(),
        },
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn started_context_delivers_due_reminder() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let mut ctx = AppContext::with_sink(config(&dir, true, false), sink.clone()).unwrap();
    ctx.health_check().unwrap();

    ctx.reminders
        .create_reminder(Destination(11), "stand up and stretch", Utc::now())
        .await
        .unwrap();

    ctx.start().await.unwrap();
    assert_eq!(ctx.running_loops(), 3);
    tokio::time::sleep(Duration::from_millis(300)).await;
    ctx.shutdown().await.unwrap();
    assert_eq!(ctx.running_loops(), 0);

    assert_eq!(
        sink.0.lock().unwrap().clone(),
        vec![(Destination(11), "stand up and stretch".to_string())]
    );
    let reminder_stats = ctx
        .dispatch_stats()
        .into_iter()
        .find(|(kind, _)| *kind == ItemKind::Reminder)
        .map(|(_, stats)| stats)
        .unwrap();
    assert_eq!(reminder_stats.delivered, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_dispatch_leaves_items_pending() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let mut ctx = AppContext::with_sink(config(&dir, false, false), sink.clone()).unwrap();

    let id = ctx.reminders.create_reminder(Destination(11), "not yet", Utc::now()).await.unwrap();

    ctx.start().await.unwrap();
    assert_eq!(ctx.running_loops(), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.shutdown().await.unwrap();

    assert!(sink.0.lock().unwrap().is_empty());
    assert!(!ctx.reminders.get_reminder(id).await.unwrap().unwrap().done);
    assert!(ctx.calendar().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn calendar_worker_mirrors_local_source() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let mut ctx = AppContext::with_sink(config(&dir, false, true), sink).unwrap();

    let calendar = ctx.calendar().expect("calendar enabled");
    calendar.add_event(CalendarEvent {
        external_id: "evt-1".into(),
        title: "Planning".into(),
        starts_at: Utc::now(),
    });

    ctx.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    ctx.shutdown().await.unwrap();

    let mirrored = ctx.sync_store.mirrored_events("team").await.unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].title, "Planning");
    assert!(ctx.sync_store.load_state("team").await.unwrap().is_synced());
}
