//! Lock-free metrics collection and periodic reporting
//!
//! Counter updates are lock-free atomics; `report()` swaps the periodic
//! counters to zero to take a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not be used for coordination.

use crate::services::dashboard::Totals;
use crate::services::store::RefreshOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for refresh latency (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

pub struct Metrics {
    /// Snapshots applied (monotonic)
    refreshes_total: AtomicU64,
    /// Snapshots discarded as stale (monotonic)
    refreshes_discarded: AtomicU64,
    /// Source fetch failures (monotonic)
    fetch_failures: AtomicU64,
    /// Shipments assessed (monotonic)
    assessments_total: AtomicU64,
    /// Risk level transitions (monotonic)
    risk_changes_total: AtomicU64,
    /// Data issues found (monotonic)
    data_issues_total: AtomicU64,
    /// Refreshes since last report (reset on report)
    refreshes_since_report: AtomicU64,
    /// Refresh latency histogram (reset on report)
    refresh_latency_buckets: [AtomicU64; NUM_BUCKETS],
    refresh_latency_sum_us: AtomicU64,
    refresh_latency_max_us: AtomicU64,
    /// Point-in-time gauges from the last applied refresh
    shipments: AtomicU64,
    delayed: AtomicU64,
    at_risk: AtomicU64,
    on_time: AtomicU64,
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            refreshes_total: AtomicU64::new(0),
            refreshes_discarded: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            assessments_total: AtomicU64::new(0),
            risk_changes_total: AtomicU64::new(0),
            data_issues_total: AtomicU64::new(0),
            refreshes_since_report: AtomicU64::new(0),
            refresh_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            refresh_latency_sum_us: AtomicU64::new(0),
            refresh_latency_max_us: AtomicU64::new(0),
            shipments: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
            at_risk: AtomicU64::new(0),
            on_time: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record an applied refresh and its end-to-end latency
    pub fn record_refresh(&self, outcome: &RefreshOutcome, latency_us: u64) {
        self.refreshes_total.fetch_add(1, Ordering::Relaxed);
        self.refreshes_since_report.fetch_add(1, Ordering::Relaxed);
        self.assessments_total.fetch_add(outcome.assessed as u64, Ordering::Relaxed);
        self.risk_changes_total.fetch_add(outcome.changed as u64, Ordering::Relaxed);
        self.data_issues_total.fetch_add(outcome.issues as u64, Ordering::Relaxed);

        self.refresh_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.refresh_latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.refresh_latency_max_us, latency_us);

        self.set_totals(&outcome.totals);
    }

    #[inline]
    pub fn record_refresh_discarded(&self) {
        self.refreshes_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_totals(&self, totals: &Totals) {
        self.shipments.store(totals.count as u64, Ordering::Relaxed);
        self.delayed.store(totals.delayed as u64, Ordering::Relaxed);
        self.at_risk.store(totals.at_risk as u64, Ordering::Relaxed);
        self.on_time.store(totals.on_time as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn refreshes_total(&self) -> u64 {
        self.refreshes_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn refreshes_discarded(&self) -> u64 {
        self.refreshes_discarded.load(Ordering::Relaxed)
    }

    /// Snapshot the counters, resetting the periodic ones
    pub fn report(&self) -> MetricsSummary {
        let refresh_count = self.refreshes_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.refresh_latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.refresh_latency_max_us.swap(0, Ordering::Relaxed);
        let latency_buckets = swap_buckets(&self.refresh_latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let refreshes_per_min = if elapsed.as_secs_f64() > 0.0 {
            refresh_count as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            refreshes_total: self.refreshes_total.load(Ordering::Relaxed),
            refreshes_discarded: self.refreshes_discarded.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            assessments_total: self.assessments_total.load(Ordering::Relaxed),
            risk_changes_total: self.risk_changes_total.load(Ordering::Relaxed),
            data_issues_total: self.data_issues_total.load(Ordering::Relaxed),
            refreshes_per_min,
            refresh_latency_buckets: latency_buckets,
            refresh_avg_us: if refresh_count > 0 { latency_sum / refresh_count } else { 0 },
            refresh_max_us: latency_max,
            refresh_p50_us: percentile_from_buckets(&latency_buckets, 0.50),
            refresh_p99_us: percentile_from_buckets(&latency_buckets, 0.99),
            shipments: self.shipments.load(Ordering::Relaxed),
            delayed: self.delayed.load(Ordering::Relaxed),
            at_risk: self.at_risk.load(Ordering::Relaxed),
            on_time: self.on_time.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub refreshes_total: u64,
    pub refreshes_discarded: u64,
    pub fetch_failures: u64,
    pub assessments_total: u64,
    pub risk_changes_total: u64,
    pub data_issues_total: u64,
    pub refreshes_per_min: f64,
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub refresh_latency_buckets: [u64; NUM_BUCKETS],
    pub refresh_avg_us: u64,
    pub refresh_max_us: u64,
    pub refresh_p50_us: u64,
    pub refresh_p99_us: u64,
    pub shipments: u64,
    pub delayed: u64,
    pub at_risk: u64,
    pub on_time: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            refreshes_total = %self.refreshes_total,
            refreshes_per_min = format!("{:.1}", self.refreshes_per_min),
            discarded = %self.refreshes_discarded,
            fetch_failures = %self.fetch_failures,
            assessments = %self.assessments_total,
            risk_changes = %self.risk_changes_total,
            data_issues = %self.data_issues_total,
            avg_us = %self.refresh_avg_us,
            p99_us = %self.refresh_p99_us,
            shipments = %self.shipments,
            delayed = %self.delayed,
            at_risk = %self.at_risk,
            on_time = %self.on_time,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(assessed: usize, changed: usize, issues: usize) -> RefreshOutcome {
        RefreshOutcome {
            assessed,
            changed,
            issues,
            totals: Totals { count: assessed, at_risk: 1, delayed: changed, on_time: assessed - 1 - changed },
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.refreshes_total(), 0);
        assert_eq!(metrics.fetch_failures(), 0);
    }

    #[test]
    fn test_record_refresh() {
        let metrics = Metrics::new();
        metrics.record_refresh(&outcome(10, 2, 1), 300);
        metrics.record_refresh(&outcome(12, 1, 0), 100);
        metrics.record_fetch_failure();
        metrics.record_refresh_discarded();

        let summary = metrics.report();
        assert_eq!(summary.refreshes_total, 2);
        assert_eq!(summary.assessments_total, 22);
        assert_eq!(summary.risk_changes_total, 3);
        assert_eq!(summary.data_issues_total, 1);
        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.refreshes_discarded, 1);
        assert_eq!(summary.refresh_avg_us, 200);
        assert_eq!(summary.refresh_max_us, 300);
        // gauges reflect the latest refresh
        assert_eq!(summary.shipments, 12);
        assert_eq!(summary.delayed, 1);
        assert_eq!(summary.on_time, 10);
    }

    #[test]
    fn test_report_resets_periodic_counters() {
        let metrics = Metrics::new();
        metrics.record_refresh(&outcome(5, 0, 0), 150);
        let _ = metrics.report();

        let summary = metrics.report();
        assert_eq!(summary.refreshes_total, 1);
        assert_eq!(summary.refresh_avg_us, 0);
        assert_eq!(summary.refresh_max_us, 0);
        assert_eq!(summary.refresh_p99_us, 0);
        assert_eq!(summary.shipments, 5);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(51201), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_refresh(&outcome(2, 0, 0), 150);
        }
        let summary = metrics.report();
        assert_eq!(summary.refresh_p50_us, 200);
        assert_eq!(summary.refresh_p99_us, 200);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        m.record_refresh(&outcome(2, 0, 0), i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.refreshes_total(), 4000);
    }
}
