//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `HERALD_DB_PATH` is missing or a value is invalid, falls back to a
//!    config file
//! 3. Searches several paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `HERALD_DB_PATH`: Database file path (required)
//! - `HERALD_DB_POOL_SIZE`: Connection pool size
//! - `ENABLE_SCHEDULER` / `HERALD_DISPATCH_ENABLED`: Start the dispatch loops
//! - `HERALD_{REMINDERS,ALARMS,TRIGGERS}_POLL_SECS`: Per-loop poll interval
//! - `HERALD_{REMINDERS,ALARMS,TRIGGERS}_JITTER_SECS`: Per-loop jitter bound
//! - `HERALD_BATCH_LIMIT`: Maximum deliveries per cycle (all loops)
//! - `HERALD_NOTIFY_CHANNEL_ID`: Channel that also receives every alarm
//! - `HERALD_BOT_TOKEN`: Telegram bot token
//! - `HERALD_TELEGRAM_API_BASE`: Telegram API base URL
//! - `HERALD_CALENDAR_SYNC_ENABLED`, `HERALD_CALENDAR_SYNC_INTERVAL_SECS`,
//!   `HERALD_CALENDAR_SOURCE_ID`: Calendar reconciliation
//! - `HERALD_LOG_LEVEL`, `HERALD_LOG_JSON`: Tracing output
//!
//! ## File Locations
//! The loader searches `config.{json,toml}` and `herald.{json,toml}` in the
//! current directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use herald_domain::constants::DEFAULT_DB_POOL_SIZE;
use herald_domain::{
    CalendarSyncConfig, Config, DatabaseConfig, DispatchSettings, HeraldError, ItemKind,
    LoggingConfig, Result, TelegramConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "herald.json", "herald.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `HeraldError::Config` if neither source yields a valid config.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `HERALD_DB_PATH` is required; everything else falls back to the
/// same defaults a config file gets.
///
/// # Errors
/// Returns `HeraldError::Config` if the database path is missing or a value
/// does not parse.
pub fn load_from_env() -> Result<Config> {
    let database = DatabaseConfig {
        path: env_var("HERALD_DB_PATH")?,
        pool_size: env_parse("HERALD_DB_POOL_SIZE")?.unwrap_or(DEFAULT_DB_POOL_SIZE),
    };

    let mut dispatch = DispatchSettings {
        enabled: env_bool("ENABLE_SCHEDULER", false) || env_bool("HERALD_DISPATCH_ENABLED", false),
        notify_channel_id: env_parse("HERALD_NOTIFY_CHANNEL_ID")?,
        ..DispatchSettings::default()
    };
    let batch_limit: Option<usize> = env_parse("HERALD_BATCH_LIMIT")?;
    for kind in ItemKind::ALL {
        let prefix = loop_prefix(kind);
        let settings = dispatch.for_kind_mut(kind);
        if let Some(secs) = env_parse(&format!("{prefix}_POLL_SECS"))? {
            settings.poll_interval_secs = secs;
        }
        if let Some(secs) = env_parse(&format!("{prefix}_JITTER_SECS"))? {
            settings.jitter_secs = secs;
        }
        settings.batch_limit = batch_limit;
    }

    let mut telegram = TelegramConfig {
        bot_token: env_opt("HERALD_BOT_TOKEN"),
        ..TelegramConfig::default()
    };
    if let Some(api_base) = env_opt("HERALD_TELEGRAM_API_BASE") {
        telegram.api_base = api_base;
    }

    let mut calendar = CalendarSyncConfig {
        enabled: env_bool("HERALD_CALENDAR_SYNC_ENABLED", false),
        ..CalendarSyncConfig::default()
    };
    if let Some(secs) = env_parse("HERALD_CALENDAR_SYNC_INTERVAL_SECS")? {
        calendar.interval_secs = secs;
    }
    if let Some(source_id) = env_opt("HERALD_CALENDAR_SOURCE_ID") {
        calendar.source_id = source_id;
    }

    let mut logging =
        LoggingConfig { json: env_bool("HERALD_LOG_JSON", false), ..LoggingConfig::default() };
    if let Some(level) = env_opt("HERALD_LOG_LEVEL") {
        logging.level = level;
    }

    Ok(Config { database, dispatch, telegram, calendar, logging })
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations.
/// Format is detected by file extension.
///
/// # Errors
/// Returns `HeraldError::Config` if the file is missing, unreadable or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(HeraldError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            HeraldError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| HeraldError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| HeraldError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| HeraldError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(HeraldError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Search the standard locations for a configuration file
///
/// Returns the first existing candidate, or `None`.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

const fn loop_prefix(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Reminder => "HERALD_REMINDERS",
        ItemKind::Alarm => "HERALD_ALARMS",
        ItemKind::Trigger => "HERALD_TRIGGERS",
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| HeraldError::Config(format!("Missing required environment variable: {key}")))
}

/// Set and non-blank.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| HeraldError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const HERALD_VARS: [&str; 19] = [
        "HERALD_DB_PATH",
        "HERALD_DB_POOL_SIZE",
        "ENABLE_SCHEDULER",
        "HERALD_DISPATCH_ENABLED",
        "HERALD_REMINDERS_POLL_SECS",
        "HERALD_REMINDERS_JITTER_SECS",
        "HERALD_ALARMS_POLL_SECS",
        "HERALD_ALARMS_JITTER_SECS",
        "HERALD_TRIGGERS_POLL_SECS",
        "HERALD_TRIGGERS_JITTER_SECS",
        "HERALD_BATCH_LIMIT",
        "HERALD_NOTIFY_CHANNEL_ID",
        "HERALD_BOT_TOKEN",
        "HERALD_TELEGRAM_API_BASE",
        "HERALD_CALENDAR_SYNC_ENABLED",
        "HERALD_CALENDAR_SYNC_INTERVAL_SECS",
        "HERALD_CALENDAR_SOURCE_ID",
        "HERALD_LOG_LEVEL",
        "HERALD_LOG_JSON",
    ];

    fn temp_config(suffix: &str) -> std::io::Result<NamedTempFile> {
        tempfile::Builder::new().prefix("herald").suffix(suffix).tempfile()
    }

    fn clear_env() {
        for key in HERALD_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn env_bool_accepts_common_spellings() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (value, expected) in
            [("1", true), ("TRUE", true), ("yes", true), ("on", true), ("0", false), ("off", false)]
        {
            std::env::set_var("HERALD_TEST_BOOL", value);
            assert_eq!(env_bool("HERALD_TEST_BOOL", !expected), expected, "value {value}");
        }

        std::env::remove_var("HERALD_TEST_BOOL");
        assert!(env_bool("HERALD_TEST_BOOL", true));
        assert!(!env_bool("HERALD_TEST_BOOL", false));
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("HERALD_DB_PATH", "/tmp/herald.db");

        let config = load_from_env().expect("config loads");
        assert_eq!(config.database.path, "/tmp/herald.db");
        assert_eq!(config.database.pool_size, DEFAULT_DB_POOL_SIZE);
        assert!(!config.dispatch.enabled);
        assert_eq!(config.dispatch, DispatchSettings::default());
        assert!(config.telegram.bot_token.is_none());

        clear_env();
    }

    #[test]
    fn env_overrides_per_loop_settings() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("HERALD_DB_PATH", "/tmp/herald.db");
        std::env::set_var("ENABLE_SCHEDULER", "true");
        std::env::set_var("HERALD_ALARMS_POLL_SECS", "15");
        std::env::set_var("HERALD_ALARMS_JITTER_SECS", "2");
        std::env::set_var("HERALD_TRIGGERS_POLL_SECS", "30");
        std::env::set_var("HERALD_BATCH_LIMIT", "100");
        std::env::set_var("HERALD_NOTIFY_CHANNEL_ID", "-100123");
        std::env::set_var("HERALD_BOT_TOKEN", "123:abc");
        std::env::set_var("HERALD_LOG_JSON", "1");

        let config = load_from_env().expect("config loads");
        assert!(config.dispatch.enabled);
        assert_eq!(config.dispatch.alarms.poll_interval_secs, 15);
        assert_eq!(config.dispatch.alarms.jitter_secs, 2);
        assert_eq!(config.dispatch.triggers.poll_interval_secs, 30);
        assert_eq!(config.dispatch.triggers.jitter_secs, 0);
        assert_eq!(config.dispatch.reminders.batch_limit, Some(100));
        assert_eq!(config.dispatch.notify_channel_id, Some(-100_123));
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert!(config.logging.json);

        clear_env();
    }

    #[test]
    fn missing_db_path_is_a_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, HeraldError::Config(_)));
    }

    #[test]
    fn invalid_number_is_a_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("HERALD_DB_PATH", "/tmp/herald.db");
        std::env::set_var("HERALD_REMINDERS_POLL_SECS", "soon");

        let err = load_from_env().unwrap_err();
        assert!(
            matches!(err, HeraldError::Config(msg) if msg.contains("HERALD_REMINDERS_POLL_SECS"))
        );

        clear_env();
    }

    #[test]
    fn loads_toml_file_with_defaults() {
        let mut file = temp_config(".toml").expect("temp file");
        writeln!(
            file,
            r#"
[database]
path = "herald.db"

[dispatch]
enabled = true

[dispatch.triggers]
poll_interval_secs = 10
"#
        )
        .expect("write config");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("config loads");
        assert!(config.dispatch.enabled);
        assert_eq!(config.dispatch.triggers.poll_interval_secs, 10);
        assert_eq!(config.dispatch.reminders, herald_domain::LoopSettings::reminders());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn loads_json_file() {
        let mut file = temp_config(".json").expect("temp file");
        write!(file, r#"{{"database": {{"path": "herald.db", "pool_size": 2}}}}"#)
            .expect("write config");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("config loads");
        assert_eq!(config.database.pool_size, 2);
    }

    #[test]
    fn rejects_unknown_extension_and_missing_file() {
        let file = temp_config(".yaml").expect("temp file");
        assert!(matches!(
            load_from_file(Some(file.path().to_path_buf())),
            Err(HeraldError::Config(_))
        ));
        assert!(load_from_file(Some(PathBuf::from("/nonexistent/herald.toml"))).is_err());
    }
}
