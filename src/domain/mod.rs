//! Domain models - shipment records, statuses and SLA tables
//!
//! This module contains the canonical data types used throughout the system:
//! - `Shipment` - the tracked entity and its creation request
//! - `Status` / `StatusCatalog` - lifecycle stages, metadata and transitions
//! - `SlaTables` - per-status and per-type SLA hours
//! - `RiskLevel`, `Priority`, `ShipmentType`, `Timestamp` - value types

pub mod shipment;
pub mod sla;
pub mod status;
pub mod types;

// Re-export commonly used types at module level
pub use shipment::{NewShipment, Shipment, StatusSince};
pub use sla::SlaTables;
pub use status::{Status, StatusCatalog, StatusColumn, StatusInfo};
pub use types::{Priority, RiskLevel, ShipmentId, ShipmentType, Timestamp};
