//! SLA status projection against the explicit expected delivery time
//!
//! Separate from risk assessment: this only compares `now` with
//! `expectedDelivery` and feeds the "Xh overdue" / "Xh remaining" display.
//! A missing deadline is normal; an unparseable one is reported as an issue.

use crate::domain::shipment::Shipment;
use crate::domain::types::Timestamp;
use crate::services::risk::{hours_between, DataIssue, TimestampField};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaStatus {
    /// Hours past the expected delivery (0 unless overdue)
    pub elapsed_hours: f64,
    /// Hours until the expected delivery (0 when overdue)
    pub remaining_hours: f64,
    pub is_overdue: bool,
    /// False when the record has no usable expected delivery time
    pub has_deadline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<DataIssue>,
}

impl SlaStatus {
    fn no_deadline(issue: Option<DataIssue>) -> Self {
        Self {
            elapsed_hours: 0.0,
            remaining_hours: 0.0,
            is_overdue: false,
            has_deadline: false,
            issue,
        }
    }

    pub fn label(&self) -> String {
        if !self.has_deadline {
            "no deadline".to_string()
        } else if self.is_overdue {
            format!("{}h overdue", self.elapsed_hours.round())
        } else {
            format!("{}h remaining", self.remaining_hours.round())
        }
    }
}

pub fn sla_status(shipment: &Shipment, now: DateTime<Utc>) -> SlaStatus {
    let expected = match &shipment.expected_delivery {
        Timestamp::Valid(t) => *t,
        Timestamp::Missing => return SlaStatus::no_deadline(None),
        invalid @ Timestamp::Invalid(_) => {
            let issue = DataIssue::for_timestamp(TimestampField::ExpectedDelivery, invalid);
            return SlaStatus::no_deadline(issue);
        }
    };

    if now > expected {
        SlaStatus {
            elapsed_hours: hours_between(expected, now),
            remaining_hours: 0.0,
            is_overdue: true,
            has_deadline: true,
            issue: None,
        }
    } else {
        SlaStatus {
            elapsed_hours: 0.0,
            remaining_hours: hours_between(now, expected),
            is_overdue: false,
            has_deadline: true,
            issue: None,
        }
    }
}
