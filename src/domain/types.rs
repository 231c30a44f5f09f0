//! Shared types for shipment tracking

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Newtype wrapper for shipment IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub String);

impl ShipmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShipmentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Shipment category, determines the whole-shipment SLA budget
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShipmentType {
    ConsumerGoods,
    LightIndustry,
    MedicalEquipment,
    /// Any category outside the standard set (kept verbatim)
    Other(String),
}

impl std::str::FromStr for ShipmentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "consumer goods" => ShipmentType::ConsumerGoods,
            "light industry" => ShipmentType::LightIndustry,
            "medical equipment" => ShipmentType::MedicalEquipment,
            _ => ShipmentType::Other(trimmed.to_string()),
        })
    }
}

impl ShipmentType {
    pub fn as_str(&self) -> &str {
        match self {
            ShipmentType::ConsumerGoods => "consumer goods",
            ShipmentType::LightIndustry => "light industry",
            ShipmentType::MedicalEquipment => "medical equipment",
            ShipmentType::Other(s) => s,
        }
    }
}

impl fmt::Display for ShipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ShipmentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShipmentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(ShipmentType::Other(raw)))
    }
}

/// Shipment priority (informational, never used by risk assessment)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived risk classification, ordered by severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum RiskLevel {
    #[default]
    None,
    AtRisk,
    Delayed,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "None",
            RiskLevel::AtRisk => "AtRisk",
            RiskLevel::Delayed => "Delayed",
        }
    }

    /// Human-readable label for display
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::None => "On Time",
            RiskLevel::AtRisk => "At Risk",
            RiskLevel::Delayed => "Delayed",
        }
    }

    #[inline]
    pub fn is_flagged(&self) -> bool {
        *self != RiskLevel::None
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    /// Accepts the wire names as well as the display labels ("At Risk", "On Time")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "none" | "ontime" => Ok(RiskLevel::None),
            "atrisk" => Ok(RiskLevel::AtRisk),
            "delayed" => Ok(RiskLevel::Delayed),
            _ => Err(format!("unknown risk level '{}'", s.trim())),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forgiving deserializers for fields that must never reject a record
pub(crate) mod lenient {
    use super::{Priority, RiskLevel};
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Other(IgnoredAny),
    }

    fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Loose::deserialize(deserializer)? {
            Loose::Text(s) => Some(s),
            Loose::Other(_) => None,
        })
    }

    /// `riskLevel` is recomputed on ingest; null or unrecognised reads as on time
    pub fn risk_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RiskLevel, D::Error> {
        Ok(text(deserializer)?.and_then(|s| s.parse().ok()).unwrap_or_default())
    }

    /// Null or non-string text reads as empty
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text(deserializer)?.unwrap_or_default())
    }

    /// Null or unrecognised priority reads as the default (medium)
    pub fn priority<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Priority, D::Error> {
        Ok(text(deserializer)?.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

/// Record timestamp that may be missing or unparseable
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS` (read as UTC),
/// plain dates (midnight UTC) and epoch milliseconds. Anything else is kept
/// as `Invalid` so records still load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Timestamp {
    #[default]
    Missing,
    Valid(DateTime<Utc>),
    Invalid(String),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Timestamp::Missing;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Timestamp::Valid(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Timestamp::Valid(naive.and_utc());
        }
        if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Timestamp::Valid(midnight.and_utc());
        }

        Timestamp::Invalid(trimmed.to_string())
    }

    pub fn from_epoch_ms(ms: i64) -> Self {
        match Utc.timestamp_millis_opt(ms).single() {
            Some(dt) => Timestamp::Valid(dt),
            None => Timestamp::Invalid(ms.to_string()),
        }
    }

    /// The parsed instant, if any
    #[inline]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Valid(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Timestamp::Missing)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Valid(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Missing => f.write_str("-"),
            Timestamp::Valid(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Timestamp::Invalid(raw) => write!(f, "invalid({})", raw),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::Missing => serializer.serialize_none(),
            Timestamp::Valid(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Timestamp::Invalid(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::{self, Visitor};

        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a date string, epoch milliseconds or null")
            }

            fn visit_str<E>(self, value: &str) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                Ok(Timestamp::parse(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                match i64::try_from(value) {
                    Ok(ms) => Ok(Timestamp::from_epoch_ms(ms)),
                    Err(_) => Ok(Timestamp::Invalid(value.to_string())),
                }
            }

            fn visit_i64<E>(self, value: i64) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                Ok(Timestamp::from_epoch_ms(value))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                if value.is_finite() {
                    Ok(Timestamp::from_epoch_ms(value as i64))
                } else {
                    Ok(Timestamp::Invalid(value.to_string()))
                }
            }

            fn visit_none<E>(self) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                Ok(Timestamp::Missing)
            }

            fn visit_unit<E>(self) -> Result<Timestamp, E>
            where
                E: de::Error,
            {
                Ok(Timestamp::Missing)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Timestamp, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(TimestampVisitor)
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}
