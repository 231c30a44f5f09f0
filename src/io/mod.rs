//! IO modules - external system interfaces
//!
//! - `source` - Shipment snapshot sources (JSON file, in-memory)
//! - `report` - Assessment output to file (JSONL format)

pub mod report;
pub mod source;

// Re-export commonly used types
pub use report::ReportWriter;
pub use source::{parse_shipments, JsonFileSource, MemorySource, ShipmentSource};
