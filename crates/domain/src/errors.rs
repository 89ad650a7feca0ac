//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Herald
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum HeraldError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Herald operations
pub type Result<T> = std::result::Result<T, HeraldError>;

/// Failure reported by a delivery sink for a single message.
///
/// Every variant is treated as transient by the dispatcher: the item stays
/// pending and is offered again on the next cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The messaging API answered but refused the message.
    #[error("message rejected (status {status}): {description}")]
    Rejected {
        /// HTTP status returned by the upstream API
        status: u16,
        /// Upstream description, if any
        description: String,
    },

    /// The request never produced a usable response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The sink cannot send at all (missing credentials, bad endpoint).
    #[error("sink not configured: {0}")]
    Unconfigured(String),
}

impl From<DeliveryError> for HeraldError {
    fn from(value: DeliveryError) -> Self {
        Self::Delivery(value.to_string())
    }
}
