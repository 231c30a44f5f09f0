//! Dashboard aggregates: risk totals and column grouping

use crate::domain::shipment::Shipment;
use crate::domain::status::{StatusCatalog, StatusColumn};
use crate::domain::types::RiskLevel;
use serde::Serialize;

pub const DEFAULT_AT_RISK_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub count: usize,
    pub at_risk: usize,
    pub delayed: usize,
    pub on_time: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouped {
    pub new: Vec<Shipment>,
    pub in_progress: Vec<Shipment>,
    pub completed: Vec<Shipment>,
}

impl Grouped {
    pub fn column(&self, column: StatusColumn) -> &[Shipment] {
        match column {
            StatusColumn::New => &self.new,
            StatusColumn::InProgress => &self.in_progress,
            StatusColumn::Completed => &self.completed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total: Totals,
    pub grouped: Grouped,
}

impl DashboardSummary {
    /// Count by risk level and group by catalog column, preserving input order
    pub fn build<'a, I>(catalog: &StatusCatalog, shipments: I) -> Self
    where
        I: IntoIterator<Item = &'a Shipment>,
    {
        let mut summary = Self::default();

        for shipment in shipments {
            summary.total.count += 1;
            match shipment.risk_level {
                RiskLevel::None => summary.total.on_time += 1,
                RiskLevel::AtRisk => summary.total.at_risk += 1,
                RiskLevel::Delayed => summary.total.delayed += 1,
            }

            let bucket = match catalog.column(&shipment.status) {
                StatusColumn::New => &mut summary.grouped.new,
                StatusColumn::InProgress => &mut summary.grouped.in_progress,
                StatusColumn::Completed => &mut summary.grouped.completed,
            };
            bucket.push(shipment.clone());
        }

        summary
    }
}

/// Flagged shipments, Delayed before AtRisk, oldest first within a level
pub fn at_risk_shipments<'a, I>(shipments: I, limit: usize) -> Vec<Shipment>
where
    I: IntoIterator<Item = &'a Shipment>,
{
    let mut flagged: Vec<Shipment> = shipments
        .into_iter()
        .filter(|s| s.risk_level.is_flagged())
        .cloned()
        .collect();

    flagged.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.created_date.instant().cmp(&b.created_date.instant()))
    });
    flagged.truncate(limit);
    flagged
}
