//! # Herald
//!
//! Process wiring for the notification dispatcher: builds the SQLite-backed
//! ports, the delivery sink and the background workers from [`Config`], and
//! owns their lifecycle.
//!
//! [`Config`]: herald_domain::Config

pub mod context;
pub mod logging;

pub use context::AppContext;
