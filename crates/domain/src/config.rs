//! Configuration structures
//!
//! Deserialized from TOML/JSON files or assembled from environment variables
//! by the infrastructure loader. Every section except `database` has
//! defaults, so a minimal file only names the database path.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CALENDAR_SYNC_INTERVAL_SECS, DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_JITTER_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TELEGRAM_API_BASE,
};
use crate::types::ItemKind;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub calendar: CalendarSyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

const fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Runtime controls for the three dispatch loops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Gate for starting any loop at all.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "LoopSettings::reminders")]
    pub reminders: LoopSettings,
    #[serde(default = "LoopSettings::alarms")]
    pub alarms: LoopSettings,
    #[serde(default = "LoopSettings::triggers")]
    pub triggers: LoopSettings,
    /// Secondary channel that also receives every alarm.
    #[serde(default)]
    pub notify_channel_id: Option<i64>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            reminders: LoopSettings::reminders(),
            alarms: LoopSettings::alarms(),
            triggers: LoopSettings::triggers(),
            notify_channel_id: None,
        }
    }
}

impl DispatchSettings {
    /// Settings of the loop serving `kind`.
    pub const fn for_kind(&self, kind: ItemKind) -> &LoopSettings {
        match kind {
            ItemKind::Reminder => &self.reminders,
            ItemKind::Alarm => &self.alarms,
            ItemKind::Trigger => &self.triggers,
        }
    }

    /// Mutable settings of the loop serving `kind`.
    pub fn for_kind_mut(&mut self, kind: ItemKind) -> &mut LoopSettings {
        match kind {
            ItemKind::Reminder => &mut self.reminders,
            ItemKind::Alarm => &mut self.alarms,
            ItemKind::Trigger => &mut self.triggers,
        }
    }
}

/// Poll cadence of one loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    pub poll_interval_secs: u64,
    /// Upper bound (exclusive) of the random delay added to every sleep.
    #[serde(default)]
    pub jitter_secs: u64,
    /// Maximum number of deliveries per cycle; `None` delivers every due item.
    #[serde(default)]
    pub batch_limit: Option<usize>,
}

impl LoopSettings {
    pub const fn reminders() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            jitter_secs: DEFAULT_JITTER_SECS,
            batch_limit: None,
        }
    }

    pub const fn alarms() -> Self {
        Self::reminders()
    }

    /// Triggers poll on a fixed cadence.
    pub const fn triggers() -> Self {
        Self { poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS, jitter_secs: 0, batch_limit: None }
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}

/// Telegram Bot API settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; when absent deliveries are only logged.
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_TELEGRAM_API_BASE.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: None, api_base: default_api_base() }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// External calendar reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_calendar_interval")]
    pub interval_secs: u64,
    /// Identifier under which sync state is stored.
    #[serde(default = "default_calendar_source")]
    pub source_id: String,
}

const fn default_calendar_interval() -> u64 {
    DEFAULT_CALENDAR_SYNC_INTERVAL_SECS
}

fn default_calendar_source() -> String {
    "primary".to_string()
}

impl Default for CalendarSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_calendar_interval(),
            source_id: default_calendar_source(),
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}
