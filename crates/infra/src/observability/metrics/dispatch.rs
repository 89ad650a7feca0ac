//! Per-worker dispatch counters
//!
//! One instance per dispatch loop. Counters only ever grow; `snapshot()`
//! reads them without resetting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use herald_core::CycleReport;
use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

const MAX_DURATION_SAMPLES: usize = 256;

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub cycles: u64,
    pub fetch_errors: u64,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
    pub committed: u64,
    pub commit_errors: u64,
}

/// Atomic counters fed by a dispatch worker.
#[derive(Debug)]
pub struct DispatchMetrics {
    cycles: AtomicU64,
    fetch_errors: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    committed: AtomicU64,
    commit_errors: AtomicU64,
    cycle_times_ms: Mutex<VecDeque<u64>>,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            commit_errors: AtomicU64::new(0),
            cycle_times_ms: Mutex::new(VecDeque::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// Fold a finished cycle into the counters.
    pub fn record_cycle(&self, report: &CycleReport, elapsed: Duration) -> MetricsResult<()> {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(to_u64(report.delivered), Ordering::Relaxed);
        self.failed.fetch_add(to_u64(report.failed), Ordering::Relaxed);
        self.skipped.fetch_add(to_u64(report.skipped), Ordering::Relaxed);
        self.committed.fetch_add(to_u64(report.committed), Ordering::Relaxed);
        self.commit_errors.fetch_add(to_u64(report.commit_errors), Ordering::Relaxed);
        self.record_cycle_time(elapsed)
    }

    /// A cycle that could not read its due set.
    pub fn record_fetch_error(&self) -> MetricsResult<()> {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn record_cycle_time(&self, elapsed: Duration) -> MetricsResult<()> {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let mut times = match self.cycle_times_ms.lock() {
            Ok(guard) => guard,
            Err(poison_err) => {
                tracing::warn!(
                    metric = "DispatchMetrics::cycle_times_ms",
                    "Mutex poisoned during cycle time recording, recovering data"
                );
                poison_err.into_inner()
            }
        };
        times.push_back(ms);
        if times.len() > MAX_DURATION_SAMPLES {
            times.pop_front();
        }
        Ok(())
    }

    /// 95th percentile of recent cycle durations in milliseconds.
    pub fn p95_cycle_time_ms(&self) -> MetricsResult<u64> {
        let times = match self.cycle_times_ms.lock() {
            Ok(guard) => guard,
            Err(poison_err) => poison_err.into_inner(),
        };
        if times.is_empty() {
            return Err(MetricsError::EmptyData { metric: "P95" });
        }
        let mut sorted: Vec<u64> = times.iter().copied().collect();
        sorted.sort_unstable();
        let idx = (sorted.len() * 95).div_ceil(100).saturating_sub(1);
        Ok(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            commit_errors: self.commit_errors.load(Ordering::Relaxed),
        }
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_accumulate_report_counters() {
        let metrics = DispatchMetrics::new();
        let report = CycleReport { fetched: 3, delivered: 2, failed: 1, committed: 2, ..Default::default() };

        metrics.record_cycle(&report, Duration::from_millis(12)).unwrap();
        metrics.record_cycle(&report, Duration::from_millis(30)).unwrap();
        metrics.record_fetch_error().unwrap();

        let stats = metrics.snapshot();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.delivered, 4);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.committed, 4);
        assert_eq!(stats.fetch_errors, 1);
    }

    #[test]
    fn p95_requires_samples() {
        let metrics = DispatchMetrics::new();
        assert!(matches!(metrics.p95_cycle_time_ms(), Err(MetricsError::EmptyData { .. })));

        for ms in 1..=20 {
            metrics.record_cycle(&CycleReport::default(), Duration::from_millis(ms)).unwrap();
        }
        assert_eq!(metrics.p95_cycle_time_ms().unwrap(), 19);
    }
}
