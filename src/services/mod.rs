//! Services - assessment logic and state management
//!
//! This module contains the core business logic services:
//! - `risk` - Pure risk classification against the SLA tables
//! - `sla_status` - Overdue / remaining projection against the expected delivery
//! - `query` - Filter and sort contract for listings
//! - `dashboard` - Risk totals, column grouping and the at-risk list
//! - `store` - In-memory shipment store, sole writer of `riskLevel`
//! - `refresher` - Periodic snapshot refresh loop
//! - `clock` - Injectable time source

pub mod clock;
pub mod dashboard;
pub mod query;
pub mod refresher;
pub mod risk;
pub mod sla_status;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use dashboard::{at_risk_shipments, DashboardSummary, Totals};
pub use query::{ShipmentFilter, SortDirection, SortField, SortSpec, StatusFilter};
pub use refresher::{RefreshResult, Refresher};
pub use risk::{DataIssue, RiskAssessment, RiskEngine, RiskReason};
pub use sla_status::{sla_status, SlaStatus};
pub use store::{RealtimeUpdate, RefreshOutcome, ShipmentStore, SnapshotTicket, StatusUpdate, StoreError};
