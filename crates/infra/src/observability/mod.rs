//! Observability infrastructure for dispatch metrics
//!
//! Counters are lock-free atomics; the cycle duration ring buffer uses a
//! std `Mutex` with explicit poison recovery:
//!
//! ```rust
//! # use std::sync::Mutex;
//! # let mutex = Mutex::new(0);
//! let guard = match mutex.lock() {
//!     Ok(guard) => guard,
//!     Err(poison_err) => {
//!         tracing::warn!("Mutex poisoned, recovering");
//!         poison_err.into_inner()
//!     }
//! };
//! ```
//!
//! Record methods return `MetricsResult<()>` so callers can log and drop a
//! failed sample without disturbing the dispatch loop.

pub mod metrics;

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Empty data set - cannot calculate aggregate metric
    #[error("Empty data: cannot calculate {metric}")]
    EmptyData {
        /// Metric name that failed (e.g., "P95", "average")
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Log a failed metric write and carry on.
pub(crate) fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        tracing::warn!(metric = metric, error = ?err, "Failed to record worker metric");
    }
}
