//! Assessment reports - one JSON line per shipment per refresh
//!
//! Lines are appended to the configured file in JSONL format.

use crate::domain::shipment::Shipment;
use crate::services::risk::RiskAssessment;
use crate::services::sla_status::{sla_status, SlaStatus};
use crate::services::store::ShipmentStore;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportLine<'a> {
    assessed_at: String,
    shipment_id: &'a str,
    #[serde(rename = "type")]
    shipment_type: &'a str,
    status: &'a str,
    risk_level: &'a str,
    assessment: &'a RiskAssessment,
    sla: &'a SlaStatus,
    sla_label: String,
}

pub struct ReportWriter {
    file_path: String,
}

impl ReportWriter {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "report_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write one shipment's assessment; returns true on success
    pub fn write_entry(
        &self,
        at: DateTime<Utc>,
        shipment: &Shipment,
        assessment: &RiskAssessment,
        sla: &SlaStatus,
    ) -> bool {
        let result = self
            .open()
            .and_then(|mut file| write_line(&mut file, at, shipment, assessment, sla));

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(shipment_id = %shipment.id, error = %e, "report_write_failed");
                false
            }
        }
    }

    /// Assess every stored shipment at the store's clock and write it out.
    ///
    /// The file is opened once per snapshot. Blocking; run it off the async
    /// workers. Returns the number of lines written.
    pub fn write_snapshot(&self, store: &ShipmentStore) -> usize {
        let now = store.now();
        let shipments = store.list();

        let mut file = match self.open() {
            Ok(file) => BufWriter::new(file),
            Err(e) => {
                error!(file = %self.file_path, error = %e, "report_open_failed");
                return 0;
            }
        };

        let mut written = 0;
        for shipment in &shipments {
            let assessment = store.engine().assess(shipment, now);
            let sla = sla_status(shipment, now);
            match write_line(&mut file, now, shipment, &assessment, &sla) {
                Ok(()) => written += 1,
                Err(e) => error!(shipment_id = %shipment.id, error = %e, "report_write_failed"),
            }
        }

        if let Err(e) = file.flush() {
            error!(file = %self.file_path, error = %e, "report_flush_failed");
            return 0;
        }

        debug!(file = %self.file_path, written, total = shipments.len(), "report_written");
        written
    }

    fn open(&self) -> std::io::Result<File> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        OpenOptions::new().create(true).append(true).open(path)
    }
}

fn write_line<W: Write>(
    out: &mut W,
    at: DateTime<Utc>,
    shipment: &Shipment,
    assessment: &RiskAssessment,
    sla: &SlaStatus,
) -> std::io::Result<()> {
    let line = ReportLine {
        assessed_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        shipment_id: shipment.id.as_str(),
        shipment_type: shipment.shipment_type.as_str(),
        status: shipment.status.as_str(),
        risk_level: assessment.level.as_str(),
        assessment,
        sla,
        sla_label: sla.label(),
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shipment::NewShipment;
    use crate::domain::status::StatusCatalog;
    use crate::domain::types::ShipmentType;
    use crate::services::clock::FixedClock;
    use crate::services::risk::RiskEngine;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_write_snapshot_creates_dirs_and_appends() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested/reports/assessments.jsonl");
        let writer = ReportWriter::new(file_path.to_str().unwrap());

        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(t0));
        let store = ShipmentStore::new(RiskEngine::default(), StatusCatalog::standard(), clock.clone());
        store.create(
            NewShipment::new(ShipmentType::MedicalEquipment)
                .with_id("SHP-1")
                .with_expected_delivery(t0 + Duration::hours(10)),
        );
        store.create(NewShipment::new(ShipmentType::ConsumerGoods).with_id("SHP-2"));

        clock.advance(Duration::hours(13));
        assert_eq!(writer.write_snapshot(&store), 2);
        assert_eq!(writer.write_snapshot(&store), 2);

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["shipmentId"], "SHP-1");
        assert_eq!(first["type"], "medical equipment");
        assert_eq!(first["riskLevel"], "Delayed");
        assert_eq!(first["sla"]["isOverdue"], true);
        assert_eq!(first["slaLabel"], "3h overdue");
        assert_eq!(first["assessedAt"], "2025-03-01T13:00:00.000Z");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["sla"]["hasDeadline"], false);
    }

    #[test]
    fn test_write_failure_returns_false() {
        let dir = tempdir().unwrap();
        // a directory cannot be opened for append
        let writer = ReportWriter::new(dir.path().to_str().unwrap());
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let shipment = NewShipment::new(ShipmentType::ConsumerGoods).into_shipment(t0);
        let assessment = RiskEngine::default().assess(&shipment, t0);
        let sla = sla_status(&shipment, t0);
        assert!(!writer.write_entry(t0, &shipment, &assessment, &sla));
    }

    #[test]
    fn test_write_snapshot_unopenable_file_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().to_str().unwrap());
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let store = ShipmentStore::new(
            RiskEngine::default(),
            StatusCatalog::standard(),
            Arc::new(FixedClock::new(t0)),
        );
        store.create(NewShipment::new(ShipmentType::ConsumerGoods));
        assert_eq!(writer.write_snapshot(&store), 0);
    }
}
