//! Shipment record - the tracked entity
//!
//! Field names follow the camelCase JSON records produced by the storage
//! layer. `riskLevel` is derived and is only ever written by the store after
//! re-assessment.

use crate::domain::status::Status;
use crate::domain::types::{lenient, Priority, RiskLevel, ShipmentId, ShipmentType, Timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new time-sortable shipment ID (`SHP-<uuidv7>`)
pub fn new_shipment_id() -> ShipmentId {
    ShipmentId(format!("SHP-{}", Uuid::now_v7()))
}

/// Instant the current status began, with the field it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSince {
    StatusUpdatedAt(DateTime<Utc>),
    /// `statusUpdatedAt` was missing or invalid; `lastUpdate` used instead
    LastUpdate(DateTime<Utc>),
    Unknown,
}

impl StatusSince {
    #[inline]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            StatusSince::StatusUpdatedAt(t) | StatusSince::LastUpdate(t) => Some(*t),
            StatusSince::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    #[serde(alias = "_id")]
    pub id: ShipmentId,
    #[serde(rename = "type")]
    pub shipment_type: ShipmentType,
    pub status: Status,
    #[serde(default)]
    pub status_updated_at: Timestamp,
    #[serde(default)]
    pub last_update: Timestamp,
    #[serde(default)]
    pub created_date: Timestamp,
    #[serde(default)]
    pub expected_delivery: Timestamp,
    #[serde(default, deserialize_with = "lenient::priority")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient::string")]
    pub current_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::risk_level")]
    pub risk_level: RiskLevel,
}

impl Shipment {
    /// When the current status began.
    ///
    /// Fallback order: `statusUpdatedAt`, then `lastUpdate`, then unknown.
    /// An invalid timestamp is treated the same as a missing one.
    pub fn status_since(&self) -> StatusSince {
        if let Some(t) = self.status_updated_at.instant() {
            return StatusSince::StatusUpdatedAt(t);
        }
        if let Some(t) = self.last_update.instant() {
            return StatusSince::LastUpdate(t);
        }
        StatusSince::Unknown
    }
}

/// Request to create a shipment; the store assigns status and timestamps
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShipment {
    #[serde(default)]
    pub id: Option<ShipmentId>,
    #[serde(rename = "type")]
    pub shipment_type: ShipmentType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub expected_delivery: Timestamp,
    #[serde(default)]
    pub current_location: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl NewShipment {
    pub fn new(shipment_type: ShipmentType) -> Self {
        Self {
            id: None,
            shipment_type,
            priority: Priority::default(),
            expected_delivery: Timestamp::Missing,
            current_location: String::new(),
            origin: None,
            destination: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(ShipmentId::new(id));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expected_delivery(mut self, at: DateTime<Utc>) -> Self {
        self.expected_delivery = Timestamp::Valid(at);
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.current_location = location.to_string();
        self
    }

    /// Materialize the record in its initial state at `now`
    pub fn into_shipment(self, now: DateTime<Utc>) -> Shipment {
        Shipment {
            id: self.id.unwrap_or_else(new_shipment_id),
            shipment_type: self.shipment_type,
            status: Status::WaitingForPickup,
            status_updated_at: Timestamp::Valid(now),
            last_update: Timestamp::Valid(now),
            created_date: Timestamp::Valid(now),
            expected_delivery: self.expected_delivery,
            priority: self.priority,
            current_location: self.current_location,
            origin: self.origin,
            destination: self.destination,
            delay_reason: None,
            risk_level: RiskLevel::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_deserialize_record() {
        let json = r#"{
            "_id": "SHP-001",
            "type": "medical equipment",
            "status": "IN_TRANSIT",
            "statusUpdatedAt": "2025-03-01T10:00:00Z",
            "lastUpdate": "2025-03-01T11:00:00Z",
            "createdDate": "2025-03-01T08:00:00Z",
            "expectedDelivery": "2025-03-03T08:00:00Z",
            "priority": "high",
            "currentLocation": "Port of Haifa",
            "riskLevel": "AtRisk"
        }"#;

        let shipment: Shipment = serde_json::from_str(json).unwrap();
        assert_eq!(shipment.id.as_str(), "SHP-001");
        assert_eq!(shipment.shipment_type, ShipmentType::MedicalEquipment);
        assert_eq!(shipment.status, Status::InTransit);
        assert_eq!(shipment.priority, Priority::High);
        assert_eq!(shipment.created_date.instant(), Some(t0()));
        assert_eq!(shipment.risk_level, RiskLevel::AtRisk);
        assert!(shipment.delay_reason.is_none());
    }

    #[test]
    fn test_deserialize_minimal_record_uses_defaults() {
        let json = r#"{"id": "SHP-002", "type": "furniture", "status": "TELEPORTED"}"#;
        let shipment: Shipment = serde_json::from_str(json).unwrap();
        assert_eq!(shipment.priority, Priority::Medium);
        assert_eq!(shipment.risk_level, RiskLevel::None);
        assert!(shipment.created_date.is_missing());
        assert_eq!(shipment.status, Status::Unknown("TELEPORTED".to_string()));
        assert_eq!(shipment.shipment_type, ShipmentType::Other("furniture".to_string()));
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let shipment = NewShipment::new(ShipmentType::ConsumerGoods).with_id("SHP-9").into_shipment(t0());
        let value = serde_json::to_value(&shipment).unwrap();
        assert_eq!(value["id"], "SHP-9");
        assert_eq!(value["type"], "consumer goods");
        assert_eq!(value["status"], "WAITING_FOR_PICKUP");
        assert_eq!(value["riskLevel"], "None");
        assert_eq!(value["createdDate"], "2025-03-01T08:00:00.000Z");
        assert!(value.get("delayReason").is_none());
    }

    #[test]
    fn test_status_since_fallback_order() {
        let mut shipment = NewShipment::new(ShipmentType::ConsumerGoods).into_shipment(t0());
        let later = t0() + chrono::Duration::hours(3);
        shipment.status_updated_at = Timestamp::Valid(later);
        assert_eq!(shipment.status_since(), StatusSince::StatusUpdatedAt(later));

        shipment.status_updated_at = Timestamp::Missing;
        assert_eq!(shipment.status_since(), StatusSince::LastUpdate(t0()));

        shipment.status_updated_at = Timestamp::Invalid("garbage".to_string());
        assert_eq!(shipment.status_since(), StatusSince::LastUpdate(t0()));

        shipment.last_update = Timestamp::Missing;
        assert_eq!(shipment.status_since(), StatusSince::Unknown);
        assert!(shipment.status_since().instant().is_none());
    }

    #[test]
    fn test_new_shipment_initial_state() {
        let shipment = NewShipment::new(ShipmentType::LightIndustry)
            .with_priority(Priority::Critical)
            .with_location("Ashdod")
            .into_shipment(t0());

        assert!(shipment.id.as_str().starts_with("SHP-"));
        assert_eq!(shipment.status, Status::WaitingForPickup);
        assert_eq!(shipment.risk_level, RiskLevel::None);
        assert_eq!(shipment.created_date.instant(), Some(t0()));
        assert_eq!(shipment.status_since(), StatusSince::StatusUpdatedAt(t0()));
        assert_eq!(shipment.current_location, "Ashdod");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = new_shipment_id();
        let b = new_shipment_id();
        assert_ne!(a, b);
        // "SHP-" + 36-char UUID
        assert_eq!(a.as_str().len(), 40);
    }
}
