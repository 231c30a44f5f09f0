//! SLA tables - per-status and whole-shipment time budgets

use crate::domain::status::Status;
use crate::domain::types::ShipmentType;
use rustc_hash::FxHashMap;

/// Whole-shipment budget for types missing from the type table (5 days)
pub const DEFAULT_SHIPMENT_SLA_HOURS: f64 = 120.0;

/// Standard per-status budgets; statuses not listed have no per-status SLA
const STANDARD_STATUS_HOURS: [(Status, f64); 13] = [
    (Status::WaitingForPickup, 12.0),
    (Status::PickedUp, 2.0),
    (Status::AtWarehouse, 8.0),
    (Status::HeadingToPort, 4.0),
    (Status::InTransit, 24.0),
    (Status::Customs, 1.0),
    (Status::CustomsHold, 1.0),
    (Status::OutForDelivery, 12.0),
    (Status::Delivered, 0.0),
    (Status::DeliveryAttemptFailed, 0.0),
    (Status::ReturnedToSender, 0.0),
    (Status::Cancelled, 0.0),
    (Status::Lost, 0.0),
];

/// Standard budgets from creation to delivery
const STANDARD_TYPE_HOURS: [(ShipmentType, f64); 3] = [
    (ShipmentType::ConsumerGoods, 120.0),
    (ShipmentType::LightIndustry, 168.0),
    (ShipmentType::MedicalEquipment, 48.0),
];

/// Per-status and per-type SLA hours
#[derive(Debug, Clone)]
pub struct SlaTables {
    status_hours: FxHashMap<Status, f64>,
    type_hours: FxHashMap<ShipmentType, f64>,
}

impl SlaTables {
    pub fn standard() -> Self {
        Self {
            status_hours: STANDARD_STATUS_HOURS.into_iter().collect(),
            type_hours: STANDARD_TYPE_HOURS.into_iter().collect(),
        }
    }

    /// Hours allowed in `status`; 0 when no per-status SLA applies
    #[inline]
    pub fn status_hours(&self, status: &Status) -> f64 {
        self.status_hours.get(status).copied().unwrap_or(0.0)
    }

    /// Hours allowed from creation to delivery for `shipment_type`
    #[inline]
    pub fn type_hours(&self, shipment_type: &ShipmentType) -> f64 {
        self.type_hours.get(shipment_type).copied().unwrap_or(DEFAULT_SHIPMENT_SLA_HOURS)
    }

    pub fn with_status_hours(mut self, status: Status, hours: f64) -> Self {
        self.status_hours.insert(status, hours);
        self
    }

    pub fn with_type_hours(mut self, shipment_type: ShipmentType, hours: f64) -> Self {
        self.type_hours.insert(shipment_type, hours);
        self
    }
}

impl Default for SlaTables {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_status_hours() {
        let sla = SlaTables::standard();
        assert_eq!(sla.status_hours(&Status::WaitingForPickup), 12.0);
        assert_eq!(sla.status_hours(&Status::InTransit), 24.0);
        assert_eq!(sla.status_hours(&Status::CustomsHold), 1.0);
        assert_eq!(sla.status_hours(&Status::Delivered), 0.0);
    }

    #[test]
    fn test_released_and_unknown_have_no_status_sla() {
        let sla = SlaTables::standard();
        assert_eq!(sla.status_hours(&Status::Released), 0.0);
        assert_eq!(sla.status_hours(&Status::Unknown("FOUND".to_string())), 0.0);
    }

    #[test]
    fn test_type_hours_with_default() {
        let sla = SlaTables::standard();
        assert_eq!(sla.type_hours(&ShipmentType::ConsumerGoods), 120.0);
        assert_eq!(sla.type_hours(&ShipmentType::LightIndustry), 168.0);
        assert_eq!(sla.type_hours(&ShipmentType::MedicalEquipment), 48.0);
        assert_eq!(
            sla.type_hours(&ShipmentType::Other("furniture".to_string())),
            DEFAULT_SHIPMENT_SLA_HOURS
        );
    }

    #[test]
    fn test_overrides() {
        let sla = SlaTables::standard()
            .with_type_hours(ShipmentType::Other("perishables".to_string()), 24.0)
            .with_status_hours(Status::Customs, 6.0);
        assert_eq!(sla.type_hours(&ShipmentType::Other("perishables".to_string())), 24.0);
        assert_eq!(sla.status_hours(&Status::Customs), 6.0);
        // untouched entries keep their standard values
        assert_eq!(sla.status_hours(&Status::InTransit), 24.0);
    }
}
