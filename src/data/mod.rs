pub mod parser;

use serde::{Deserialize, Serialize};

/// Experiment parameters extracted from the export preamble.
///
/// Every field is optional: instrument exports omit keys freely, and each
/// consumer documents its own fallback (see `processing::capacitance` and
/// `processing::segmentation`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Initial potential (V).
    pub init_e: Option<f64>,
    /// Upper scan endpoint (V).
    pub high_e: Option<f64>,
    /// Lower scan endpoint (V).
    pub low_e: Option<f64>,
    /// Scan rate (V/s).
    pub scan_rate: Option<f64>,
    /// Number of half-scans in the experiment; cycle count = segment / 2.
    pub segment: Option<u32>,
    /// Voltage step between samples (V).
    pub sample_interval: Option<f64>,
    /// Instrument current-range setting (A/V).
    pub sensitivity: Option<f64>,
}

/// One recorded point of the voltammogram. Order within the series encodes
/// scan direction and time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub voltage: f64,
    pub current: f64,
}

impl Sample {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }
}

/// Parsed contents of one export file: preamble metadata, the ordered sample
/// series, and how many non-blank data lines were dropped as unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExport {
    pub metadata: Metadata,
    pub samples: Vec<Sample>,
    pub skipped_rows: usize,
}
