//! Shipment filtering and sorting
//!
//! `ShipmentFilter` is the filter contract consumed by the store. It
//! deserializes from the dashboard's camelCase filter object, where
//! `"all"` (or an absent key) disables the `type` and `priority` filters.

use crate::domain::shipment::Shipment;
use crate::domain::status::{StatusCatalog, StatusColumn};
use crate::domain::types::{Priority, RiskLevel, ShipmentType};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

/// Column filter over the status catalog's grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    #[default]
    All,
    New,
    InProgress,
    Completed,
}

impl StatusFilter {
    #[inline]
    pub fn matches(&self, column: StatusColumn) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::New => column == StatusColumn::New,
            StatusFilter::InProgress => column == StatusColumn::InProgress,
            StatusFilter::Completed => column == StatusColumn::Completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "all" => Ok(StatusFilter::All),
            "new" => Ok(StatusFilter::New),
            "inprogress" => Ok(StatusFilter::InProgress),
            "completed" => Ok(StatusFilter::Completed),
            _ => Err(format!("unknown status filter '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Id,
    Type,
    Status,
    Priority,
    CreatedDate,
    ExpectedDelivery,
    LastUpdate,
    RiskLevel,
    CurrentLocation,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "id" => Ok(SortField::Id),
            "type" => Ok(SortField::Type),
            "status" => Ok(SortField::Status),
            "priority" => Ok(SortField::Priority),
            "createddate" | "created" => Ok(SortField::CreatedDate),
            "expecteddelivery" | "expected" => Ok(SortField::ExpectedDelivery),
            "lastupdate" => Ok(SortField::LastUpdate),
            "risklevel" | "risk" => Ok(SortField::RiskLevel),
            "currentlocation" | "location" => Ok(SortField::CurrentLocation),
            _ => Err(format!("unknown sort field '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Asc }
    }

    pub fn desc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Desc }
    }

    pub fn compare(&self, a: &Shipment, b: &Shipment) -> Ordering {
        let ordering = compare_by(self.field, a, b);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn compare_by(field: SortField, a: &Shipment, b: &Shipment) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Type => a.shipment_type.as_str().cmp(b.shipment_type.as_str()),
        SortField::Status => a
            .status
            .lifecycle_index()
            .cmp(&b.status.lifecycle_index())
            .then_with(|| a.status.as_str().cmp(b.status.as_str())),
        SortField::Priority => a.priority.cmp(&b.priority),
        // missing/invalid timestamps (None) sort before any valid one
        SortField::CreatedDate => a.created_date.instant().cmp(&b.created_date.instant()),
        SortField::ExpectedDelivery => {
            a.expected_delivery.instant().cmp(&b.expected_delivery.instant())
        }
        SortField::LastUpdate => a.last_update.instant().cmp(&b.last_update.instant()),
        // None < AtRisk < Delayed
        SortField::RiskLevel => a.risk_level.cmp(&b.risk_level),
        SortField::CurrentLocation => a
            .current_location
            .to_lowercase()
            .cmp(&b.current_location.to_lowercase()),
    }
}

/// Filter contract for listing shipments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipmentFilter {
    /// Case-insensitive substring of id, type or current location
    pub search: String,
    pub status: StatusFilter,
    pub show_delayed: bool,
    pub show_at_risk: bool,
    #[serde(rename = "type", deserialize_with = "all_or_value")]
    pub shipment_type: Option<ShipmentType>,
    #[serde(deserialize_with = "all_or_value")]
    pub priority: Option<Priority>,
    pub sort: Option<SortSpec>,
}

impl ShipmentFilter {
    pub fn matches(&self, catalog: &StatusCatalog, shipment: &Shipment) -> bool {
        if !self.search.is_empty() && !matches_search(shipment, &self.search.to_lowercase()) {
            return false;
        }

        if !self.status.matches(catalog.column(&shipment.status)) {
            return false;
        }

        if self.show_delayed || self.show_at_risk {
            let wanted = (self.show_delayed && shipment.risk_level == RiskLevel::Delayed)
                || (self.show_at_risk && shipment.risk_level == RiskLevel::AtRisk);
            if !wanted {
                return false;
            }
        }

        if let Some(shipment_type) = &self.shipment_type {
            if &shipment.shipment_type != shipment_type {
                return false;
            }
        }

        if let Some(priority) = self.priority {
            if shipment.priority != priority {
                return false;
            }
        }

        true
    }

    /// Filter, then sort (stable) if a sort is set
    pub fn apply<'a, I>(&self, catalog: &StatusCatalog, shipments: I) -> Vec<Shipment>
    where
        I: IntoIterator<Item = &'a Shipment>,
    {
        let mut result: Vec<Shipment> = shipments
            .into_iter()
            .filter(|shipment| self.matches(catalog, shipment))
            .cloned()
            .collect();

        if let Some(sort) = &self.sort {
            result.sort_by(|a, b| sort.compare(a, b));
        }

        result
    }
}

fn matches_search(shipment: &Shipment, needle: &str) -> bool {
    shipment.id.as_str().to_lowercase().contains(needle)
        || shipment.shipment_type.as_str().to_lowercase().contains(needle)
        || shipment.current_location.to_lowercase().contains(needle)
}

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "")
}

/// Deserialize `"all"`, `""` or null as `None`, anything else via `FromStr`
fn all_or_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shipment::NewShipment;
    use crate::domain::status::Status;
    use chrono::{Duration, TimeZone, Utc};

    fn make(id: &str, t: ShipmentType, status: Status, risk: RiskLevel, location: &str) -> Shipment {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut s = NewShipment::new(t).with_id(id).with_location(location).into_shipment(created);
        s.status = status;
        s.risk_level = risk;
        s
    }

    fn fixtures() -> Vec<Shipment> {
        vec![
            make("SHP-001", ShipmentType::ConsumerGoods, Status::WaitingForPickup, RiskLevel::None, "Tel Aviv"),
            make("SHP-002", ShipmentType::MedicalEquipment, Status::InTransit, RiskLevel::Delayed, "Port of Haifa"),
            make("SHP-003", ShipmentType::LightIndustry, Status::CustomsHold, RiskLevel::AtRisk, "Ashdod"),
            make("SHP-004", ShipmentType::ConsumerGoods, Status::Delivered, RiskLevel::None, "Jerusalem"),
            make("SHP-005", ShipmentType::MedicalEquipment, Status::OutForDelivery, RiskLevel::AtRisk, "Haifa"),
        ]
    }

    fn ids(shipments: &[Shipment]) -> Vec<&str> {
        shipments.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();
        let result = ShipmentFilter::default().apply(&catalog, &all);
        assert_eq!(result.len(), all.len());
    }

    #[test]
    fn test_search_is_case_insensitive_over_id_type_location() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();

        let filter = ShipmentFilter { search: "haifa".to_string(), ..Default::default() };
        assert_eq!(ids(&filter.apply(&catalog, &all)), vec!["SHP-002", "SHP-005"]);

        let filter = ShipmentFilter { search: "LIGHT".to_string(), ..Default::default() };
        assert_eq!(ids(&filter.apply(&catalog, &all)), vec!["SHP-003"]);

        let filter = ShipmentFilter { search: "shp-004".to_string(), ..Default::default() };
        assert_eq!(ids(&filter.apply(&catalog, &all)), vec!["SHP-004"]);
    }

    #[test]
    fn test_status_column_filter() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();

        let new = ShipmentFilter { status: StatusFilter::New, ..Default::default() };
        assert_eq!(ids(&new.apply(&catalog, &all)), vec!["SHP-001"]);

        let in_progress = ShipmentFilter { status: StatusFilter::InProgress, ..Default::default() };
        assert_eq!(ids(&in_progress.apply(&catalog, &all)), vec!["SHP-002", "SHP-003", "SHP-005"]);

        let completed = ShipmentFilter { status: StatusFilter::Completed, ..Default::default() };
        assert_eq!(ids(&completed.apply(&catalog, &all)), vec!["SHP-004"]);
    }

    #[test]
    fn test_risk_flags_combine_with_or() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();

        let delayed = ShipmentFilter { show_delayed: true, ..Default::default() };
        assert_eq!(ids(&delayed.apply(&catalog, &all)), vec!["SHP-002"]);

        let at_risk = ShipmentFilter { show_at_risk: true, ..Default::default() };
        assert_eq!(ids(&at_risk.apply(&catalog, &all)), vec!["SHP-003", "SHP-005"]);

        let both = ShipmentFilter { show_delayed: true, show_at_risk: true, ..Default::default() };
        assert_eq!(ids(&both.apply(&catalog, &all)), vec!["SHP-002", "SHP-003", "SHP-005"]);
    }

    #[test]
    fn test_type_and_priority_filters() {
        let catalog = StatusCatalog::standard();
        let mut all = fixtures();
        all[4].priority = Priority::Critical;

        let filter = ShipmentFilter {
            shipment_type: Some(ShipmentType::MedicalEquipment),
            priority: Some(Priority::Critical),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&catalog, &all)), vec!["SHP-005"]);
    }

    #[test]
    fn test_sort_by_risk_level_desc() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();
        let filter = ShipmentFilter {
            sort: Some(SortSpec::desc(SortField::RiskLevel)),
            ..Default::default()
        };
        let sorted = filter.apply(&catalog, &all);
        let levels: Vec<RiskLevel> = sorted.iter().map(|s| s.risk_level).collect();
        assert_eq!(
            levels,
            vec![RiskLevel::Delayed, RiskLevel::AtRisk, RiskLevel::AtRisk, RiskLevel::None, RiskLevel::None]
        );
        // stable within equal risk
        assert_eq!(ids(&sorted), vec!["SHP-002", "SHP-003", "SHP-005", "SHP-001", "SHP-004"]);
    }

    #[test]
    fn test_sort_by_status_follows_lifecycle() {
        let catalog = StatusCatalog::standard();
        let all = fixtures();
        let filter = ShipmentFilter { sort: Some(SortSpec::asc(SortField::Status)), ..Default::default() };
        assert_eq!(
            ids(&filter.apply(&catalog, &all)),
            vec!["SHP-001", "SHP-002", "SHP-003", "SHP-005", "SHP-004"]
        );
    }

    #[test]
    fn test_sort_by_expected_delivery_missing_first() {
        let catalog = StatusCatalog::standard();
        let mut all = fixtures();
        let base = Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap();
        all[0].expected_delivery = (base + Duration::hours(5)).into();
        all[1].expected_delivery = base.into();
        all[2].expected_delivery = (base + Duration::hours(1)).into();
        all[4].expected_delivery = (base + Duration::hours(2)).into();

        let filter = ShipmentFilter {
            sort: Some(SortSpec::asc(SortField::ExpectedDelivery)),
            ..Default::default()
        };
        assert_eq!(
            ids(&filter.apply(&catalog, &all)),
            vec!["SHP-004", "SHP-002", "SHP-003", "SHP-005", "SHP-001"]
        );
    }

    #[test]
    fn test_deserialize_dashboard_filter() {
        let json = r#"{
            "status": "inProgress",
            "showDelayed": true,
            "showAtRisk": false,
            "type": "all",
            "priority": "high",
            "sort": {"field": "riskLevel", "direction": "desc"}
        }"#;
        let filter: ShipmentFilter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.status, StatusFilter::InProgress);
        assert!(filter.show_delayed);
        assert_eq!(filter.shipment_type, None);
        assert_eq!(filter.priority, Some(Priority::High));
        assert_eq!(filter.sort, Some(SortSpec::desc(SortField::RiskLevel)));
        assert!(filter.search.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_unknown_priority() {
        let result: Result<ShipmentFilter, _> = serde_json::from_str(r#"{"priority": "urgent"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cli_keys() {
        assert_eq!("in-progress".parse::<StatusFilter>().unwrap(), StatusFilter::InProgress);
        assert_eq!("inProgress".parse::<StatusFilter>().unwrap(), StatusFilter::InProgress);
        assert_eq!("riskLevel".parse::<SortField>().unwrap(), SortField::RiskLevel);
        assert_eq!("expected-delivery".parse::<SortField>().unwrap(), SortField::ExpectedDelivery);
        assert!("weight".parse::<SortField>().is_err());
    }
}
