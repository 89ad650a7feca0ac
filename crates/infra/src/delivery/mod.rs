//! Delivery sink adapters

pub mod logging_sink;
pub mod telegram;

use std::sync::Arc;

use herald_core::DeliverySink;
use herald_domain::{Result, TelegramConfig};
use tracing::info;

pub use logging_sink::LoggingSink;
pub use telegram::TelegramSink;

/// Telegram when a bot token is configured, the logging sink otherwise.
pub fn sink_from_config(config: &TelegramConfig) -> Result<Arc<dyn DeliverySink>> {
    if config.bot_token.is_some() {
        info!(api_base = %config.api_base, "Delivering through Telegram");
        Ok(Arc::new(TelegramSink::new(config)?))
    } else {
        info!("No bot token configured; deliveries will only be logged");
        Ok(Arc::new(LoggingSink::new()))
    }
}
