//! Risk assessment engine
//!
//! Classifies a shipment as On Time, At Risk or Delayed from its status,
//! status start time, creation time and type, evaluated at an explicit `now`.
//!
//! - At risk: customs hold, or at least 80% of the per-status budget used
//! - Delayed: whole-shipment budget exceeded, per-status budget exceeded, or
//!   still waiting for pickup past the pickup budget
//! - Delayed always wins over at risk
//!
//! The engine is pure: no logging, no clock, no shared state. Missing or
//! invalid timestamps count as zero elapsed hours and are reported as
//! `DataIssue`s on the assessment for the caller to log.

use crate::domain::shipment::{Shipment, StatusSince};
use crate::domain::sla::SlaTables;
use crate::domain::status::Status;
use crate::domain::types::{RiskLevel, Timestamp};
use chrono::{DateTime, Utc};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Fraction of the per-status budget at which a shipment becomes at risk
pub const AT_RISK_RATIO: f64 = 0.8;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Signed hours from `from` to `to` (negative when `to` is earlier)
#[inline]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_HOUR
}

/// Predicate branch that contributed to a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    CustomsHold,
    StatusSlaWarning,
    StatusSlaExceeded,
    ShipmentSlaExceeded,
    PickupOverdue,
}

impl RiskReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskReason::CustomsHold => "customs_hold",
            RiskReason::StatusSlaWarning => "status_sla_warning",
            RiskReason::StatusSlaExceeded => "status_sla_exceeded",
            RiskReason::ShipmentSlaExceeded => "shipment_sla_exceeded",
            RiskReason::PickupOverdue => "pickup_overdue",
        }
    }
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampField {
    StatusUpdatedAt,
    LastUpdate,
    CreatedDate,
    ExpectedDelivery,
}

impl TimestampField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampField::StatusUpdatedAt => "statusUpdatedAt",
            TimestampField::LastUpdate => "lastUpdate",
            TimestampField::CreatedDate => "createdDate",
            TimestampField::ExpectedDelivery => "expectedDelivery",
        }
    }
}

/// Data-quality problem found while assessing a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    Missing { field: TimestampField },
    Invalid { field: TimestampField, raw: String },
}

impl DataIssue {
    /// Issue for a timestamp that carries no usable instant
    pub fn for_timestamp(field: TimestampField, ts: &Timestamp) -> Option<Self> {
        match ts {
            Timestamp::Valid(_) => None,
            Timestamp::Missing => Some(DataIssue::Missing { field }),
            Timestamp::Invalid(raw) => Some(DataIssue::Invalid { field, raw: raw.clone() }),
        }
    }

    pub fn field(&self) -> TimestampField {
        match self {
            DataIssue::Missing { field } | DataIssue::Invalid { field, .. } => *field,
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIssue::Missing { field } => write!(f, "{} missing", field.as_str()),
            DataIssue::Invalid { field, raw } => {
                write!(f, "{} invalid ({:?})", field.as_str(), raw)
            }
        }
    }
}

/// Full result of assessing one shipment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// At-risk predicate, independent of whether delay overrode it
    pub at_risk: bool,
    pub delayed: bool,
    pub status_sla_hours: f64,
    pub shipment_sla_hours: f64,
    pub status_elapsed_hours: f64,
    pub total_elapsed_hours: f64,
    pub reasons: SmallVec<[RiskReason; 4]>,
    pub issues: SmallVec<[DataIssue; 2]>,
}

/// Stateless classifier over a set of SLA tables
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    sla: SlaTables,
}

impl RiskEngine {
    pub fn new(sla: SlaTables) -> Self {
        Self { sla }
    }

    pub fn sla(&self) -> &SlaTables {
        &self.sla
    }

    /// Classify `shipment` at `now`
    #[inline]
    pub fn assess_risk(&self, shipment: &Shipment, now: DateTime<Utc>) -> RiskLevel {
        self.assess(shipment, now).level
    }

    /// Classify `shipment` at `now`, keeping the intermediate values
    pub fn assess(&self, shipment: &Shipment, now: DateTime<Utc>) -> RiskAssessment {
        let mut issues: SmallVec<[DataIssue; 2]> = SmallVec::new();

        let status_sla = self.sla.status_hours(&shipment.status);
        let shipment_sla = self.sla.type_hours(&shipment.shipment_type);

        // An invalid statusUpdatedAt is worth reporting even when lastUpdate covers it
        if let Timestamp::Invalid(raw) = &shipment.status_updated_at {
            issues.push(DataIssue::Invalid {
                field: TimestampField::StatusUpdatedAt,
                raw: raw.clone(),
            });
        }
        let status_elapsed = match shipment.status_since() {
            StatusSince::StatusUpdatedAt(t) | StatusSince::LastUpdate(t) => hours_between(t, now),
            StatusSince::Unknown => {
                issues.extend(DataIssue::for_timestamp(
                    TimestampField::LastUpdate,
                    &shipment.last_update,
                ));
                0.0
            }
        };

        let total_elapsed = match shipment.created_date.instant() {
            Some(created) => hours_between(created, now),
            None => {
                issues.extend(DataIssue::for_timestamp(
                    TimestampField::CreatedDate,
                    &shipment.created_date,
                ));
                0.0
            }
        };

        let mut reasons: SmallVec<[RiskReason; 4]> = SmallVec::new();

        if shipment.status == Status::CustomsHold {
            reasons.push(RiskReason::CustomsHold);
        }
        if status_sla > 0.0 && status_elapsed >= AT_RISK_RATIO * status_sla {
            reasons.push(RiskReason::StatusSlaWarning);
        }
        let at_risk = !reasons.is_empty();

        let warning_count = reasons.len();
        if total_elapsed > shipment_sla {
            reasons.push(RiskReason::ShipmentSlaExceeded);
        }
        if status_sla > 0.0 && status_elapsed > status_sla {
            reasons.push(RiskReason::StatusSlaExceeded);
        }
        if shipment.status == Status::WaitingForPickup
            && total_elapsed > self.sla.status_hours(&Status::WaitingForPickup)
        {
            reasons.push(RiskReason::PickupOverdue);
        }
        let delayed = reasons.len() > warning_count;

        let level = if delayed {
            RiskLevel::Delayed
        } else if at_risk {
            RiskLevel::AtRisk
        } else {
            RiskLevel::None
        };

        RiskAssessment {
            level,
            at_risk,
            delayed,
            status_sla_hours: status_sla,
            shipment_sla_hours: shipment_sla,
            status_elapsed_hours: status_elapsed,
            total_elapsed_hours: total_elapsed,
            reasons,
            issues,
        }
    }
}
