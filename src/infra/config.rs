//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::sla::SlaTables;
use crate::domain::status::Status;
use crate::domain::types::ShipmentType;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
struct DataConfig {
    /// JSON file with the shipment records
    #[serde(default = "default_data_file")]
    file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { file: default_data_file() }
    }
}

fn default_data_file() -> String {
    "data/shipments.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: default_refresh_interval() }
    }
}

fn default_refresh_interval() -> u64 {
    60
}

/// SLA hour overrides keyed by status / shipment type name
#[derive(Debug, Clone, Deserialize, Default)]
struct SlaConfig {
    #[serde(default)]
    statuses: BTreeMap<String, f64>,
    #[serde(default)]
    types: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReportConfig {
    #[serde(default)]
    enabled: bool,
    /// File path for assessment reports (JSONL format)
    #[serde(default = "default_report_file")]
    file: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { enabled: false, file: default_report_file() }
    }
}

fn default_report_file() -> String {
    "reports/assessments.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct DashboardConfig {
    #[serde(default = "default_at_risk_limit")]
    at_risk_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { at_risk_limit: default_at_risk_limit() }
    }
}

fn default_at_risk_limit() -> usize {
    crate::services::dashboard::DEFAULT_AT_RISK_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default)]
    format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    data: DataConfig,
    #[serde(default)]
    refresh: RefreshConfig,
    #[serde(default)]
    sla: SlaConfig,
    #[serde(default)]
    report: ReportConfig,
    #[serde(default)]
    dashboard: DashboardConfig,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    data_file: String,
    refresh_interval_secs: u64,
    sla_status_overrides: BTreeMap<String, f64>,
    sla_type_overrides: BTreeMap<String, f64>,
    report_enabled: bool,
    report_file: String,
    at_risk_limit: usize,
    metrics_interval_secs: u64,
    log_level: String,
    log_format: LogFormat,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            data_file: toml_config.data.file,
            refresh_interval_secs: toml_config.refresh.interval_secs,
            sla_status_overrides: toml_config.sla.statuses,
            sla_type_overrides: toml_config.sla.types,
            report_enabled: toml_config.report.enabled,
            report_file: toml_config.report.file,
            at_risk_limit: toml_config.dashboard.at_risk_limit,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            log_level: toml_config.logging.level,
            log_format: toml_config.logging.format,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from the CLI argument or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults.
    ///
    /// Runs before logging is initialized, so the warning goes to stderr.
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn load(cli_path: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(cli_path))
    }

    /// Standard SLA tables with the configured overrides applied.
    ///
    /// Negative or non-finite hours are skipped with a warning, as are
    /// status names outside the catalog.
    pub fn sla_tables(&self) -> SlaTables {
        let mut tables = SlaTables::standard();

        for (name, &hours) in &self.sla_status_overrides {
            if !valid_hours(hours) {
                warn!(status = %name, hours = %hours, "sla_override_invalid_hours");
                continue;
            }
            let status: Status = name.parse().unwrap_or_else(|never| match never {});
            if let Status::Unknown(raw) = &status {
                warn!(status = %raw, "sla_override_unknown_status");
                continue;
            }
            tables = tables.with_status_hours(status, hours);
        }

        for (name, &hours) in &self.sla_type_overrides {
            if !valid_hours(hours) {
                warn!(shipment_type = %name, hours = %hours, "sla_override_invalid_hours");
                continue;
            }
            let shipment_type: ShipmentType = name.parse().unwrap_or_else(|never| match never {});
            tables = tables.with_type_hours(shipment_type, hours);
        }

        tables
    }

    pub fn data_file(&self) -> &str {
        &self.data_file
    }

    pub fn refresh_interval_secs(&self) -> u64 {
        self.refresh_interval_secs
    }

    pub fn report_enabled(&self) -> bool {
        self.report_enabled
    }

    pub fn report_file(&self) -> &str {
        &self.report_file
    }

    pub fn at_risk_limit(&self) -> usize {
        self.at_risk_limit
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_format(&self) -> &LogFormat {
        &self.log_format
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn with_data_file(mut self, file: &str) -> Self {
        self.data_file = file.to_string();
        self
    }

    pub fn with_report_file(mut self, file: &str) -> Self {
        self.report_enabled = true;
        self.report_file = file.to_string();
        self
    }
}

fn valid_hours(hours: f64) -> bool {
    hours.is_finite() && hours >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_file(), "data/shipments.json");
        assert_eq!(config.refresh_interval_secs(), 60);
        assert_eq!(config.metrics_interval_secs(), 60);
        assert_eq!(config.at_risk_limit(), 10);
        assert!(!config.report_enabled());
        assert_eq!(config.report_file(), "reports/assessments.jsonl");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.log_format(), &LogFormat::Text);
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        assert_eq!(Config::resolve_config_path(Some("config/prod.toml")), "config/prod.toml");
    }

    #[test]
    fn test_empty_file_uses_section_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "empty.toml");
        assert_eq!(config.refresh_interval_secs(), 60);
        assert_eq!(config.at_risk_limit(), 10);
    }

    #[test]
    fn test_sla_tables_apply_overrides() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[sla.statuses]
IN_TRANSIT = 36.0
"customs hold" = 4.0

[sla.types]
"medical equipment" = 24.0
"hazmat" = 72.0
"#,
        )
        .unwrap();
        let tables = Config::from_toml(toml_config, "test").sla_tables();

        assert_eq!(tables.status_hours(&Status::InTransit), 36.0);
        assert_eq!(tables.status_hours(&Status::CustomsHold), 4.0);
        assert_eq!(tables.status_hours(&Status::PickedUp), 2.0);
        assert_eq!(tables.type_hours(&ShipmentType::MedicalEquipment), 24.0);
        assert_eq!(tables.type_hours(&ShipmentType::Other("hazmat".to_string())), 72.0);
        assert_eq!(tables.type_hours(&ShipmentType::LightIndustry), 168.0);
    }

    #[test]
    fn test_sla_tables_skip_invalid_overrides() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[sla.statuses]
IN_TRANSIT = -5.0
TELEPORTING = 3.0
"#,
        )
        .unwrap();
        let tables = Config::from_toml(toml_config, "test").sla_tables();
        assert_eq!(tables.status_hours(&Status::InTransit), 24.0);
        assert_eq!(tables.status_hours(&Status::Unknown("TELEPORTING".to_string())), 0.0);
    }
}
