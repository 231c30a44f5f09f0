//! Periodic refresh: fetch a snapshot, re-assess, publish
//!
//! Each pass takes a snapshot ticket before fetching so that a slow fetch
//! finishing after a newer one is discarded instead of overwriting it.

use crate::infra::metrics::Metrics;
use crate::io::report::ReportWriter;
use crate::io::source::ShipmentSource;
use crate::services::store::{RefreshOutcome, ShipmentStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshResult {
    Applied(RefreshOutcome),
    /// A newer snapshot was applied while this one was being fetched
    Discarded,
    /// Fetch failed; the previous collection is kept
    Failed,
}

pub struct Refresher {
    source: Arc<dyn ShipmentSource>,
    store: Arc<ShipmentStore>,
    metrics: Arc<Metrics>,
    report: Option<Arc<ReportWriter>>,
    interval: Duration,
}

impl Refresher {
    pub fn new(source: Arc<dyn ShipmentSource>, store: Arc<ShipmentStore>, metrics: Arc<Metrics>) -> Self {
        Self { source, store, metrics, report: None, interval: DEFAULT_REFRESH_INTERVAL }
    }

    pub fn with_report(mut self, report: ReportWriter) -> Self {
        self.report = Some(Arc::new(report));
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn refresh_once(&self) -> RefreshResult {
        let started = Instant::now();
        let ticket = self.store.begin_snapshot();

        let shipments = match self.source.fetch().await {
            Ok(shipments) => shipments,
            Err(e) => {
                self.metrics.record_fetch_failure();
                error!(
                    source = %self.source.describe(),
                    error = %format!("{:#}", e),
                    kept = self.store.len(),
                    "shipments_fetch_failed"
                );
                return RefreshResult::Failed;
            }
        };

        let Some(outcome) = self.store.apply_snapshot(ticket, shipments) else {
            self.metrics.record_refresh_discarded();
            debug!(ticket = ticket.id(), "refresh_discarded");
            return RefreshResult::Discarded;
        };

        let latency_us = started.elapsed().as_micros() as u64;
        self.metrics.record_refresh(&outcome, latency_us);

        info!(
            ticket = ticket.id(),
            assessed = outcome.assessed,
            changed = outcome.changed,
            issues = outcome.issues,
            delayed = outcome.totals.delayed,
            at_risk = outcome.totals.at_risk,
            on_time = outcome.totals.on_time,
            latency_us,
            "shipments_refreshed"
        );

        if let Some(report) = &self.report {
            let report = report.clone();
            let store = self.store.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || report.write_snapshot(&store)).await {
                error!(error = %e, "report_task_failed");
            }
        }

        RefreshResult::Applied(outcome)
    }

    /// Refresh on every tick until shutdown is signalled
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            source = %self.source.describe(),
            interval_secs = self.interval.as_secs(),
            "refresher_started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("refresher_shutdown");
                        break;
                    }
                }
            }
        }
    }
}
