//! Shipment lifecycle statuses and the status catalog
//!
//! The catalog maps every status to its presentation metadata, its column on
//! the dashboard, its permitted next statuses and its per-status SLA budget.
//! It is built from `SlaTables` so the catalog and the risk engine never
//! disagree about SLA hours.

use crate::domain::sla::SlaTables;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::{smallvec, SmallVec};
use std::borrow::Cow;
use std::fmt;

/// Lifecycle stage of a shipment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    WaitingForPickup,
    PickedUp,
    AtWarehouse,
    HeadingToPort,
    InTransit,
    Customs,
    CustomsHold,
    Released,
    OutForDelivery,
    Delivered,
    DeliveryAttemptFailed,
    ReturnedToSender,
    Cancelled,
    Lost,
    /// Status string not present in the catalog (kept verbatim)
    Unknown(String),
}

/// Every catalog status in lifecycle order
pub static ALL_STATUSES: [Status; 14] = [
    Status::WaitingForPickup,
    Status::PickedUp,
    Status::AtWarehouse,
    Status::HeadingToPort,
    Status::InTransit,
    Status::Customs,
    Status::CustomsHold,
    Status::Released,
    Status::OutForDelivery,
    Status::Delivered,
    Status::DeliveryAttemptFailed,
    Status::ReturnedToSender,
    Status::Cancelled,
    Status::Lost,
];

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::WaitingForPickup => "WAITING_FOR_PICKUP",
            Status::PickedUp => "PICKED_UP",
            Status::AtWarehouse => "AT_WAREHOUSE",
            Status::HeadingToPort => "HEADING_TO_PORT",
            Status::InTransit => "IN_TRANSIT",
            Status::Customs => "CUSTOMS",
            Status::CustomsHold => "CUSTOMS_HOLD",
            Status::Released => "RELEASED",
            Status::OutForDelivery => "OUT_FOR_DELIVERY",
            Status::Delivered => "DELIVERED",
            Status::DeliveryAttemptFailed => "DELIVERY_ATTEMPT_FAILED",
            Status::ReturnedToSender => "RETURNED_TO_SENDER",
            Status::Cancelled => "CANCELLED",
            Status::Lost => "LOST",
            Status::Unknown(s) => s,
        }
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Delivered | Status::ReturnedToSender | Status::Cancelled | Status::Lost
        )
    }

    /// Position in lifecycle order; unknown statuses sort last
    pub fn lifecycle_index(&self) -> usize {
        ALL_STATUSES.iter().position(|s| s == self).unwrap_or(ALL_STATUSES.len())
    }
}

impl std::str::FromStr for Status {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Ok(match normalized.as_str() {
            "WAITING_FOR_PICKUP" => Status::WaitingForPickup,
            "PICKED_UP" => Status::PickedUp,
            "AT_WAREHOUSE" => Status::AtWarehouse,
            "HEADING_TO_PORT" => Status::HeadingToPort,
            "IN_TRANSIT" => Status::InTransit,
            "CUSTOMS" => Status::Customs,
            "CUSTOMS_HOLD" => Status::CustomsHold,
            // RELEASEED appears in older records
            "RELEASED" | "RELEASEED" => Status::Released,
            "OUT_FOR_DELIVERY" => Status::OutForDelivery,
            "DELIVERED" => Status::Delivered,
            "DELIVERY_ATTEMPT_FAILED" => Status::DeliveryAttemptFailed,
            "RETURNED_TO_SENDER" => Status::ReturnedToSender,
            "CANCELLED" => Status::Cancelled,
            "LOST" => Status::Lost,
            _ => Status::Unknown(s.trim().to_string()),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Status::Unknown(raw)))
    }
}

/// Dashboard column a status is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusColumn {
    New,
    InProgress,
    Completed,
}

impl StatusColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColumn::New => "new",
            StatusColumn::InProgress => "inProgress",
            StatusColumn::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusColumn::New => "New",
            StatusColumn::InProgress => "In Progress",
            StatusColumn::Completed => "Completed",
        }
    }
}

/// Catalog entry for a single status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusInfo {
    pub status: Status,
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    /// True while the shipment is still moving toward delivery
    pub is_active: bool,
    pub column: StatusColumn,
    pub can_transition_to: SmallVec<[Status; 4]>,
    /// Maximum hours allowed in this status (0 = no per-status SLA)
    pub sla_hours: f64,
}

impl StatusInfo {
    /// Fallback entry for statuses outside the catalog
    fn unknown(status: Status) -> Self {
        Self {
            status,
            label: "Unknown",
            description: "Status is not part of the catalog",
            color: "#9e9e9e",
            icon: "help_outline",
            is_active: false,
            column: StatusColumn::InProgress,
            can_transition_to: SmallVec::new(),
            sla_hours: 0.0,
        }
    }

    fn standard(status: Status, sla_hours: f64) -> Self {
        let (label, description, color, icon) = describe(&status);
        let column = match status {
            Status::WaitingForPickup => StatusColumn::New,
            ref s if s.is_terminal() => StatusColumn::Completed,
            _ => StatusColumn::InProgress,
        };
        Self {
            is_active: !status.is_terminal(),
            can_transition_to: transitions(&status),
            column,
            label,
            description,
            color,
            icon,
            sla_hours,
            status,
        }
    }
}

fn describe(status: &Status) -> (&'static str, &'static str, &'static str, &'static str) {
    match status {
        Status::WaitingForPickup => {
            ("Waiting for Pickup", "Order created, waiting for courier pickup", "#90a4ae", "schedule")
        }
        Status::PickedUp => ("Picked Up", "Collected from the sender", "#4fc3f7", "inventory"),
        Status::AtWarehouse => {
            ("At Warehouse", "Stored at a logistics center", "#7986cb", "warehouse")
        }
        Status::HeadingToPort => (
            "Heading to Port",
            "On the way to the departure port or airport",
            "#64b5f6",
            "local_shipping",
        ),
        Status::InTransit => ("In Transit", "Moving by sea or air", "#2196f3", "flight"),
        Status::Customs => ("In Customs", "Undergoing customs clearance", "#ffb74d", "gavel"),
        Status::CustomsHold => {
            ("Customs Hold", "Held by customs pending inspection", "#ff7043", "report")
        }
        Status::Released => {
            ("Released from Customs", "Cleared by customs", "#81c784", "task_alt")
        }
        Status::OutForDelivery => {
            ("Out for Delivery", "With the courier for final delivery", "#26a69a", "delivery_dining")
        }
        Status::Delivered => ("Delivered", "Delivered to the recipient", "#43a047", "check_circle"),
        Status::DeliveryAttemptFailed => (
            "Delivery Attempt Failed",
            "Courier could not complete delivery",
            "#ef5350",
            "error",
        ),
        Status::ReturnedToSender => {
            ("Returned to Sender", "Sent back to the sender", "#8d6e63", "undo")
        }
        Status::Cancelled => ("Cancelled", "Shipment was cancelled", "#757575", "cancel"),
        Status::Lost => ("Lost", "Shipment could not be located", "#b71c1c", "help"),
        Status::Unknown(_) => ("Unknown", "Status is not part of the catalog", "#9e9e9e", "help_outline"),
    }
}

/// Permitted next statuses; terminal statuses have none
fn transitions(status: &Status) -> SmallVec<[Status; 4]> {
    use Status::*;
    match status {
        WaitingForPickup => smallvec![PickedUp, Cancelled],
        PickedUp => smallvec![AtWarehouse, HeadingToPort, Cancelled, Lost],
        AtWarehouse => smallvec![HeadingToPort, OutForDelivery, Cancelled, Lost],
        HeadingToPort => smallvec![InTransit, AtWarehouse, Lost],
        InTransit => smallvec![Customs, AtWarehouse, Lost],
        Customs => smallvec![CustomsHold, Released],
        CustomsHold => smallvec![Released, ReturnedToSender],
        Released => smallvec![AtWarehouse, OutForDelivery],
        OutForDelivery => smallvec![Delivered, DeliveryAttemptFailed, Lost],
        DeliveryAttemptFailed => smallvec![OutForDelivery, AtWarehouse, ReturnedToSender],
        Delivered | ReturnedToSender | Cancelled | Lost | Unknown(_) => SmallVec::new(),
    }
}

/// Static table of valid statuses, their metadata and permitted transitions
#[derive(Debug, Clone)]
pub struct StatusCatalog {
    entries: FxHashMap<Status, StatusInfo>,
}

impl StatusCatalog {
    /// Build the catalog, taking per-status SLA hours from `sla`
    pub fn from_sla(sla: &SlaTables) -> Self {
        let entries = ALL_STATUSES
            .iter()
            .map(|status| {
                let info = StatusInfo::standard(status.clone(), sla.status_hours(status));
                (status.clone(), info)
            })
            .collect();
        Self { entries }
    }

    pub fn standard() -> Self {
        Self::from_sla(&SlaTables::standard())
    }

    /// Look up a status; unknown statuses get a neutral inactive entry
    /// carrying the raw status
    pub fn status_info(&self, status: &Status) -> Cow<'_, StatusInfo> {
        match self.entries.get(status) {
            Some(info) => Cow::Borrowed(info),
            None => Cow::Owned(StatusInfo::unknown(status.clone())),
        }
    }

    pub fn can_transition(&self, from: &Status, to: &Status) -> bool {
        self.status_info(from).can_transition_to.contains(to)
    }

    pub fn column(&self, status: &Status) -> StatusColumn {
        self.status_info(status).column
    }

    /// Catalog entries in lifecycle order
    pub fn statuses(&self) -> impl Iterator<Item = &StatusInfo> {
        ALL_STATUSES.iter().filter_map(|status| self.entries.get(status))
    }
}

impl Default for StatusCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
