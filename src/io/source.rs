//! Shipment sources - where refresh snapshots come from
//!
//! `JsonFileSource` reads the storage layer's export: either a bare JSON
//! array of shipment records or an object with a `shipments` array.

use crate::domain::shipment::Shipment;
use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait ShipmentSource: Send + Sync {
    /// Fetch the full current collection
    async fn fetch(&self) -> anyhow::Result<Vec<Shipment>>;

    fn describe(&self) -> String;
}

/// Parse a shipment export (array or `{"shipments": [...]}`)
///
/// Records are decoded one at a time so an error names the record that
/// broke the export.
pub fn parse_shipments(json: &str) -> anyhow::Result<Vec<Shipment>> {
    let payload: Value = serde_json::from_str(json).context("Invalid shipment payload")?;
    let records = match payload {
        Value::Array(records) => records,
        Value::Object(mut fields) => match fields.remove("shipments") {
            Some(Value::Array(records)) => records,
            Some(_) => bail!("Invalid shipment payload: `shipments` is not an array"),
            None => bail!("Invalid shipment payload: expected an array or a `shipments` field"),
        },
        _ => bail!("Invalid shipment payload: expected an array or a `shipments` field"),
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let id = record_id(&record);
            serde_json::from_value::<Shipment>(record)
                .with_context(|| format!("Invalid shipment record {} (id {})", index, id))
        })
        .collect()
}

fn record_id(record: &Value) -> String {
    record
        .get("id")
        .or_else(|| record.get("_id"))
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

#[async_trait]
impl ShipmentSource for JsonFileSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Shipment>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read shipments file {}", self.path.display()))?;

        let shipments = parse_shipments(&content)
            .with_context(|| format!("Failed to parse shipments file {}", self.path.display()))?;

        debug!(file = %self.path.display(), count = shipments.len(), "shipments_fetched");
        Ok(shipments)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Source backed by an in-process collection
#[derive(Default)]
pub struct MemorySource {
    shipments: Mutex<Vec<Shipment>>,
}

impl MemorySource {
    pub fn new(shipments: Vec<Shipment>) -> Self {
        Self { shipments: Mutex::new(shipments) }
    }

    pub fn replace(&self, shipments: Vec<Shipment>) {
        *self.shipments.lock() = shipments;
    }
}

#[async_trait]
impl ShipmentSource for MemorySource {
    async fn fetch(&self) -> anyhow::Result<Vec<Shipment>> {
        Ok(self.shipments.lock().clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::Status;
    use crate::domain::types::{Priority, RiskLevel, ShipmentType, Timestamp};
    use std::fs;
    use tempfile::tempdir;

    const RECORD: &str = r#"{
        "_id": "SHP-100",
        "type": "medical equipment",
        "status": "IN_TRANSIT",
        "statusUpdatedAt": "2025-03-01T10:00:00Z",
        "createdDate": 1740823200000,
        "priority": "high",
        "currentLocation": "Port of Haifa",
        "riskLevel": "Delayed"
    }"#;

    #[test]
    fn test_parse_bare_array() {
        let shipments = parse_shipments(&format!("[{}]", RECORD)).unwrap();
        assert_eq!(shipments.len(), 1);
        let s = &shipments[0];
        assert_eq!(s.id.as_str(), "SHP-100");
        assert_eq!(s.shipment_type, ShipmentType::MedicalEquipment);
        assert_eq!(s.status, Status::InTransit);
        assert!(s.created_date.instant().is_some());
        assert_eq!(s.last_update, Timestamp::Missing);
    }

    #[test]
    fn test_parse_wrapped_object() {
        let shipments = parse_shipments(&format!(r#"{{"shipments": [{}]}}"#, RECORD)).unwrap();
        assert_eq!(shipments.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_shipments("{\"nope\": true}").is_err());
        assert!(parse_shipments("not json").is_err());
    }

    #[test]
    fn test_stale_derived_fields_do_not_sink_snapshot() {
        let json = r#"[
            {"id": "SHP-1", "type": "consumer goods", "status": "IN_TRANSIT", "riskLevel": null},
            {"id": "SHP-2", "type": "consumer goods", "status": "IN_TRANSIT", "riskLevel": "On Time"},
            {"id": "SHP-3", "type": "consumer goods", "status": "IN_TRANSIT", "priority": null},
            {"id": "SHP-4", "type": "consumer goods", "status": "IN_TRANSIT", "riskLevel": "At Risk",
             "priority": "urgent", "currentLocation": null}
        ]"#;
        let shipments = parse_shipments(json).unwrap();
        assert_eq!(shipments.len(), 4);
        assert_eq!(shipments[0].risk_level, RiskLevel::None);
        assert_eq!(shipments[1].risk_level, RiskLevel::None);
        assert_eq!(shipments[2].priority, Priority::Medium);
        assert_eq!(shipments[3].risk_level, RiskLevel::AtRisk);
        assert_eq!(shipments[3].priority, Priority::Medium);
        assert_eq!(shipments[3].current_location, "");
    }

    #[test]
    fn test_parse_error_names_the_broken_record() {
        let json = r#"{"shipments": [
            {"id": "SHP-1", "type": "consumer goods", "status": "IN_TRANSIT"},
            {"id": "SHP-2", "status": "IN_TRANSIT"}
        ]}"#;
        let err = format!("{:#}", parse_shipments(json).unwrap_err());
        assert!(err.contains("record 1 (id SHP-2)"), "{}", err);
        assert!(err.contains("missing field `type`"), "{}", err);
    }

    #[tokio::test]
    async fn test_json_file_source_fetch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");
        fs::write(&path, format!("[{}]", RECORD)).unwrap();

        let source = JsonFileSource::new(&path);
        let shipments = source.fetch().await.unwrap();
        assert_eq!(shipments[0].id.as_str(), "SHP-100");
        assert!(source.describe().starts_with("file:"));
    }

    #[tokio::test]
    async fn test_json_file_source_missing_file() {
        let source = JsonFileSource::new("/nonexistent/shipments.json");
        let err = source.fetch().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read shipments file"));
    }

    #[tokio::test]
    async fn test_memory_source_replace() {
        let source = MemorySource::default();
        assert!(source.fetch().await.unwrap().is_empty());
        source.replace(parse_shipments(&format!("[{}]", RECORD)).unwrap());
        assert_eq!(source.fetch().await.unwrap().len(), 1);
    }
}
