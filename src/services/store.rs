//! In-memory shipment store
//!
//! Owns the shipment collection and is the only writer of `riskLevel`:
//! every mutation re-assesses the affected records at `clock.now()`.
//!
//! Overlapping refreshes are resolved last-write-wins by ticket. A caller
//! takes a `SnapshotTicket` before fetching, and `apply_snapshot` discards
//! the result if a newer ticket has already been applied.

use crate::domain::shipment::{NewShipment, Shipment};
use crate::domain::status::{Status, StatusCatalog};
use crate::domain::types::{ShipmentId, Timestamp};
use crate::services::clock::Clock;
use crate::services::dashboard::{at_risk_shipments, DashboardSummary, Totals};
use crate::services::query::ShipmentFilter;
use crate::services::risk::{RiskAssessment, RiskEngine};
use crate::services::sla_status::{sla_status, SlaStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("shipment {0} not found")]
    NotFound(ShipmentId),
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },
    #[error("delay reason for shipment {0} is empty")]
    EmptyDelayReason(ShipmentId),
}

/// Requested status change
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub status: Status,
    #[serde(default)]
    pub location: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: Status) -> Self {
        Self { status, location: None }
    }

    pub fn at(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
}

/// Change pushed by the storage layer outside the periodic refresh
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeUpdate {
    StatusChanged(Shipment),
    NewShipment(Shipment),
    RiskChanged(ShipmentId),
    Deleted(ShipmentId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub assessed: usize,
    /// Records whose risk level differs from the stored one
    pub changed: usize,
    /// Data issues found across all records
    pub issues: usize,
    pub totals: Totals,
}

/// Ordering token for a refresh; higher tickets supersede lower ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTicket(u64);

impl SnapshotTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct Inner {
    /// Insertion order is the listing order
    records: Vec<Shipment>,
    index: FxHashMap<ShipmentId, usize>,
    last_applied: u64,
}

impl Inner {
    fn get(&self, id: &ShipmentId) -> Option<&Shipment> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    fn get_mut(&mut self, id: &ShipmentId) -> Option<&mut Shipment> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    fn upsert(&mut self, shipment: Shipment) {
        match self.index.get(&shipment.id) {
            Some(&i) => self.records[i] = shipment,
            None => {
                self.index.insert(shipment.id.clone(), self.records.len());
                self.records.push(shipment);
            }
        }
    }

    fn remove(&mut self, id: &ShipmentId) -> Option<Shipment> {
        let i = self.index.remove(id)?;
        let removed = self.records.remove(i);
        self.reindex();
        Some(removed)
    }

    fn replace_all(&mut self, records: Vec<Shipment>) {
        self.records.clear();
        self.index.clear();
        // later duplicates replace earlier ones
        for shipment in records {
            self.upsert(shipment);
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, shipment) in self.records.iter().enumerate() {
            self.index.insert(shipment.id.clone(), i);
        }
    }
}

pub struct ShipmentStore {
    engine: RiskEngine,
    catalog: StatusCatalog,
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
    next_ticket: AtomicU64,
}

impl ShipmentStore {
    pub fn new(engine: RiskEngine, catalog: StatusCatalog, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            catalog,
            clock,
            inner: RwLock::new(Inner::default()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &StatusCatalog {
        &self.catalog
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Assess and write `riskLevel` back, logging any data issues
    fn reassess(&self, shipment: &mut Shipment, now: DateTime<Utc>) -> RiskAssessment {
        let assessment = self.engine.assess(shipment, now);
        for issue in &assessment.issues {
            warn!(
                shipment_id = %shipment.id,
                field = issue.field().as_str(),
                issue = %issue,
                "shipment_data_issue"
            );
        }
        shipment.risk_level = assessment.level;
        assessment
    }

    pub fn create(&self, new: NewShipment) -> Shipment {
        let now = self.clock.now();
        let mut shipment = new.into_shipment(now);
        self.reassess(&mut shipment, now);

        info!(
            shipment_id = %shipment.id,
            shipment_type = %shipment.shipment_type,
            priority = %shipment.priority,
            "shipment_created"
        );

        self.inner.write().upsert(shipment.clone());
        shipment
    }

    /// Upsert a full record; its `riskLevel` is recomputed
    pub fn insert(&self, mut shipment: Shipment) -> Shipment {
        let now = self.clock.now();
        self.reassess(&mut shipment, now);
        debug!(shipment_id = %shipment.id, risk = %shipment.risk_level, "shipment_upserted");
        self.inner.write().upsert(shipment.clone());
        shipment
    }

    pub fn get(&self, id: &ShipmentId) -> Result<Shipment, StoreError> {
        self.inner
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn update_status(&self, id: &ShipmentId, update: StatusUpdate) -> Result<Shipment, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let shipment = inner.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if !self.catalog.can_transition(&shipment.status, &update.status) {
            warn!(
                shipment_id = %id,
                from = %shipment.status,
                to = %update.status,
                "shipment_transition_rejected"
            );
            return Err(StoreError::InvalidTransition {
                from: shipment.status.clone(),
                to: update.status,
            });
        }

        let from = std::mem::replace(&mut shipment.status, update.status);
        shipment.status_updated_at = Timestamp::Valid(now);
        shipment.last_update = Timestamp::Valid(now);
        if let Some(location) = update.location.filter(|l| !l.trim().is_empty()) {
            shipment.current_location = location;
        }
        self.reassess(shipment, now);

        info!(
            shipment_id = %id,
            from = %from,
            to = %shipment.status,
            location = %shipment.current_location,
            risk = %shipment.risk_level,
            "shipment_status_updated"
        );

        Ok(shipment.clone())
    }

    pub fn add_delay_reason(&self, id: &ShipmentId, reason: &str) -> Result<Shipment, StoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StoreError::EmptyDelayReason(id.clone()));
        }

        let now = self.clock.now();
        let mut inner = self.inner.write();
        let shipment = inner.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        shipment.delay_reason = Some(reason.to_string());
        shipment.last_update = Timestamp::Valid(now);
        self.reassess(shipment, now);

        info!(shipment_id = %id, reason = %reason, "shipment_delay_reason_added");
        Ok(shipment.clone())
    }

    pub fn remove(&self, id: &ShipmentId) -> Result<Shipment, StoreError> {
        let removed = self
            .inner
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        info!(shipment_id = %id, "shipment_removed");
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Shipment> {
        self.inner.read().records.clone()
    }

    pub fn query(&self, filter: &ShipmentFilter) -> Vec<Shipment> {
        filter.apply(&self.catalog, &self.inner.read().records)
    }

    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary::build(&self.catalog, &self.inner.read().records)
    }

    pub fn at_risk(&self, limit: usize) -> Vec<Shipment> {
        at_risk_shipments(&self.inner.read().records, limit)
    }

    /// Fresh assessment at the current time, without writing it back
    pub fn assessment(&self, id: &ShipmentId) -> Result<RiskAssessment, StoreError> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let shipment = inner.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(self.engine.assess(shipment, now))
    }

    pub fn sla_status(&self, id: &ShipmentId) -> Result<SlaStatus, StoreError> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let shipment = inner.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let status = sla_status(shipment, now);
        if let Some(issue) = &status.issue {
            warn!(
                shipment_id = %shipment.id,
                field = issue.field().as_str(),
                issue = %issue,
                "shipment_data_issue"
            );
        }
        Ok(status)
    }

    /// Re-assess the given records, writing each result back
    pub fn bulk_assess(&self, ids: &[ShipmentId]) -> Vec<(ShipmentId, Result<RiskAssessment, StoreError>)> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        ids.iter()
            .map(|id| {
                let result = match inner.get_mut(id) {
                    Some(shipment) => Ok(self.reassess(shipment, now)),
                    None => Err(StoreError::NotFound(id.clone())),
                };
                (id.clone(), result)
            })
            .collect()
    }

    /// Re-assess every record at the current time
    pub fn refresh(&self) -> RefreshOutcome {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let mut outcome = RefreshOutcome::default();

        for shipment in inner.records.iter_mut() {
            let before = shipment.risk_level;
            let assessment = self.reassess(shipment, now);
            outcome.assessed += 1;
            outcome.issues += assessment.issues.len();
            if assessment.level != before {
                outcome.changed += 1;
            }
        }
        outcome.totals = DashboardSummary::build(&self.catalog, &inner.records).total;

        debug!(assessed = outcome.assessed, changed = outcome.changed, "store_refreshed");
        outcome
    }

    /// Take a ticket before fetching a snapshot
    pub fn begin_snapshot(&self) -> SnapshotTicket {
        SnapshotTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    /// Replace the collection with `records`, unless a newer snapshot already won.
    ///
    /// Returns `None` when the snapshot was discarded as stale.
    pub fn apply_snapshot(&self, ticket: SnapshotTicket, records: Vec<Shipment>) -> Option<RefreshOutcome> {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        if ticket.0 < inner.last_applied {
            debug!(
                ticket = ticket.0,
                last_applied = inner.last_applied,
                "snapshot_discarded_stale"
            );
            return None;
        }

        let previous: FxHashMap<ShipmentId, _> = inner
            .records
            .iter()
            .map(|s| (s.id.clone(), s.risk_level))
            .collect();

        let mut outcome = RefreshOutcome::default();
        let mut assessed = Vec::with_capacity(records.len());
        for mut shipment in records {
            let assessment = self.reassess(&mut shipment, now);
            outcome.assessed += 1;
            outcome.issues += assessment.issues.len();
            // new records count as changed only when flagged
            let before = previous.get(&shipment.id).copied().unwrap_or_default();
            if before != shipment.risk_level {
                outcome.changed += 1;
            }
            assessed.push(shipment);
        }

        inner.replace_all(assessed);
        inner.last_applied = ticket.0;
        outcome.totals = DashboardSummary::build(&self.catalog, &inner.records).total;

        Some(outcome)
    }

    /// Merge a pushed change; returns the resulting record, if any
    pub fn apply_update(&self, update: RealtimeUpdate) -> Option<Shipment> {
        match update {
            RealtimeUpdate::StatusChanged(shipment) | RealtimeUpdate::NewShipment(shipment) => {
                Some(self.insert(shipment))
            }
            RealtimeUpdate::RiskChanged(id) => {
                let now = self.clock.now();
                let mut inner = self.inner.write();
                let Some(shipment) = inner.get_mut(&id) else {
                    debug!(shipment_id = %id, "realtime_update_unknown_shipment");
                    return None;
                };
                self.reassess(shipment, now);
                Some(shipment.clone())
            }
            RealtimeUpdate::Deleted(id) => {
                if self.inner.write().remove(&id).is_some() {
                    info!(shipment_id = %id, "shipment_removed");
                }
                None
            }
        }
    }
}
