//! # Herald Domain
//!
//! Business domain types for the Herald notification dispatcher.
//!
//! This crate contains:
//! - Due item types (reminders, alarms, triggers) and their common projection
//! - Calendar sync types
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Herald crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
