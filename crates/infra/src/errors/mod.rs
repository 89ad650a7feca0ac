//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{delivery_error_from_http, InfraError};
