use crate::data::{Metadata, ParsedExport, Sample};
use crate::error::AnalysisError;

/// Literal identifying a cyclic-voltammetry run among the techniques the
/// instrument can export.
pub const TECHNIQUE_MARKER: &str = "Cyclic Voltammetry";

/// Column header line that starts the sample block.
pub const DATA_HEADER: &str = "Potential/V, Current/A";

/// Metadata keys live in the file preamble; only this many lines are scanned.
const METADATA_SCAN_LINES: usize = 50;

/// Parse a raw instrument export into metadata and the ordered sample series.
///
/// Missing metadata keys are not errors; the absence is recorded as `None`
/// and downstream stages apply their documented defaults. Malformed data
/// rows (wrong field count, unparseable numbers, trailing annotations) are
/// skipped and counted, never fatal.
pub fn parse_export(content: &str) -> Result<ParsedExport, AnalysisError> {
    if !content.contains(TECHNIQUE_MARKER) {
        return Err(AnalysisError::NotCyclicVoltammetry);
    }

    let metadata = parse_metadata(content);
    let (samples, skipped_rows) = parse_samples(content)?;

    if skipped_rows > 0 {
        tracing::warn!(skipped_rows, "dropped unparseable data rows");
    }

    Ok(ParsedExport {
        metadata,
        samples,
        skipped_rows,
    })
}

/// Extract `Key (Unit) = value` fields from the preamble.
fn parse_metadata(content: &str) -> Metadata {
    let mut meta = Metadata::default();

    for line in content.lines().take(METADATA_SCAN_LINES) {
        if let Some(v) = keyed_value(line, "Init E (V)") {
            meta.init_e = v.parse().ok();
        }
        if let Some(v) = keyed_value(line, "High E (V)") {
            meta.high_e = v.parse().ok();
        }
        if let Some(v) = keyed_value(line, "Low E (V)") {
            meta.low_e = v.parse().ok();
        }
        if let Some(v) = keyed_value(line, "Scan Rate (V/s)") {
            meta.scan_rate = v.parse().ok();
        }
        if let Some(v) = keyed_value(line, "Sample Interval (V)") {
            meta.sample_interval = v.parse().ok();
        }
        if let Some(v) = keyed_value(line, "Sensitivity (A/V)") {
            meta.sensitivity = v.parse().ok();
        }
        // Segment carries no unit suffix.
        if let Some(v) = keyed_value(line, "Segment") {
            meta.segment = v.parse().ok();
        }
    }

    meta
}

/// Return the trimmed value after `=` when the line carries the given key.
fn keyed_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if !line.contains(key) {
        return None;
    }
    let (_, value) = line.split_once('=')?;
    Some(value.trim())
}

/// Read the `<voltage>,<current>` block after the data header.
/// Returns the samples and the count of non-blank lines that were skipped.
fn parse_samples(content: &str) -> Result<(Vec<Sample>, usize), AnalysisError> {
    let lines: Vec<&str> = content.lines().collect();
    let header_idx = lines
        .iter()
        .position(|line| line.contains(DATA_HEADER))
        .ok_or_else(|| AnalysisError::NoData(format!("'{DATA_HEADER}' header not found")))?;

    let body = lines[header_idx + 1..].join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        // Whitespace-only lines are not data rows and are not counted.
        if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
            continue;
        }
        match parse_row(&record) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
    }

    if samples.is_empty() {
        return Err(AnalysisError::NoData(
            "no parseable sample rows after the data header".to_string(),
        ));
    }

    Ok((samples, skipped))
}

/// A row is a sample only if it has exactly two fields, both real numbers.
fn parse_row(record: &csv::StringRecord) -> Option<Sample> {
    if record.len() != 2 {
        return None;
    }
    let voltage = record.get(0)?.trim().parse().ok()?;
    let current = record.get(1)?.trim().parse().ok()?;
    Some(Sample::new(voltage, current))
}
