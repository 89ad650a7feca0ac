//! Application constants

/// Text sent for an alarm whose event no longer exists.
pub const DEFAULT_EVENT_TITLE: &str = "Event";

// Dispatch loop defaults (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_JITTER_SECS: u64 = 5;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 5;

// Calendar sync defaults (seconds)
pub const DEFAULT_CALENDAR_SYNC_INTERVAL_SECS: u64 = 300;

// Database defaults
pub const DEFAULT_DB_PATH: &str = "herald.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

/// Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
