use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{self, Metadata, ParsedExport};
use crate::error::AnalysisError;
use crate::processing::capacitance::{self, CycleResult, DEFAULT_OVERFLOW_FACTOR};
use crate::processing::segmentation::{self, Cycle};
use crate::processing::statistics::{Aggregate, DEFAULT_OUTLIER_COUNT};

/// Tunable analysis parameters; the defaults match the instrument-side
/// conventions and are right for almost all exports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerOptions {
    /// Multiple of the sensitivity above which a current reading counts as
    /// an overflow.
    pub overflow_factor: f64,
    /// How many extreme capacitances the robust mean may drop.
    pub outlier_count: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            overflow_factor: DEFAULT_OVERFLOW_FACTOR,
            outlier_count: DEFAULT_OUTLIER_COUNT,
        }
    }
}

/// Final owned output of one analysis run, handed to external consumers
/// (tables, plots, printers). The engine keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: Metadata,
    /// Non-blank data lines dropped during parsing.
    pub skipped_rows: usize,
    /// The segmented voltammogram, for consumers that plot the raw loops.
    pub cycles: Vec<Cycle>,
    /// One result per analyzable cycle, in cycle order. Degenerate cycles
    /// have no entry; outlier cycles keep theirs with a reason attached.
    pub results: Vec<CycleResult>,
    /// Capacitances of non-outlier cycles with positive capacitance, in
    /// cycle order. Input to the aggregate.
    pub valid_capacitances: Vec<f64>,
    pub aggregate: Aggregate,
}

/// Run the full pipeline over raw export text.
pub fn analyze(content: &str, options: &AnalyzerOptions) -> Result<AnalysisReport, AnalysisError> {
    let parsed = data::parser::parse_export(content)?;
    analyze_parsed(parsed, options)
}

/// Read and analyze an export file.
pub fn analyze_file(path: &Path, options: &AnalyzerOptions) -> Result<AnalysisReport, AnalysisError> {
    let content = std::fs::read_to_string(path).map_err(|source| AnalysisError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    analyze(&content, options)
}

/// Segment, compute per-cycle capacitances, and aggregate.
///
/// Cycles are independent given the shared immutable metadata, so the
/// per-cycle stage runs on the rayon pool; the indexed iterator keeps
/// results in cycle order. Aggregation waits for the complete set.
pub fn analyze_parsed(
    parsed: ParsedExport,
    options: &AnalyzerOptions,
) -> Result<AnalysisReport, AnalysisError> {
    let ParsedExport {
        metadata,
        samples,
        skipped_rows,
    } = parsed;

    let cycles = segmentation::split_into_cycles(&samples, metadata.segment)?;
    tracing::debug!(cycles = cycles.len(), samples = samples.len(), "segmented");

    let results: Vec<CycleResult> = cycles
        .par_iter()
        .enumerate()
        .filter_map(|(i, cycle)| {
            capacitance::compute_cycle((i + 1) as u32, cycle, &metadata, options.overflow_factor)
        })
        .collect();

    let valid_capacitances: Vec<f64> = results
        .iter()
        .filter(|r| !r.is_outlier && r.capacitance > 0.0)
        .map(|r| r.capacitance)
        .collect();

    let aggregate = Aggregate::compute(&valid_capacitances, options.outlier_count)?;

    Ok(AnalysisReport {
        metadata,
        skipped_rows,
        cycles,
        results,
        valid_capacitances,
        aggregate,
    })
}

impl AnalysisReport {
    /// Format the report the way the CLI prints it.
    pub fn render_text(&self, outlier_count: usize) -> String {
        let rule = "=".repeat(70);
        let thin_rule = "-".repeat(70);
        let mut out = String::new();

        out.push_str(&rule);
        out.push_str("\nCV Analysis Results\n");
        out.push_str(&rule);
        out.push_str("\n\n");

        out.push_str(&self.render_metadata());
        out.push('\n');

        out.push_str(&format!("Detected {} cycles\n", self.cycles.len()));
        if self.skipped_rows > 0 {
            out.push_str(&format!(
                "Skipped {} unparseable data rows\n",
                self.skipped_rows
            ));
        }
        out.push('\n');

        out.push_str("Per-cycle results:\n");
        out.push_str(&thin_rule);
        out.push('\n');
        for result in &self.results {
            out.push_str(&format!("Cycle {}:\n", result.cycle_num));
            out.push_str(&format!("  Area: {:.6e} C\n", result.area));
            out.push_str(&format!(
                "  Capacitance: {:.6e} F = {:.6} mF\n",
                result.capacitance,
                result.capacitance * 1000.0
            ));
            if let Some(warning) = &result.warning {
                out.push_str(&format!("  Warning: {warning}\n"));
            }
            out.push('\n');
        }

        out.push_str(&rule);
        out.push_str("\nFinal results:\n");
        out.push_str(&thin_rule);
        out.push('\n');
        out.push_str(&format!("Valid cycles: {}\n", self.aggregate.count));
        out.push_str(&format!("Excluded outlier count: {outlier_count}\n"));

        let agg = &self.aggregate;
        if agg.count > 1 {
            out.push_str(&format!(
                "Mean capacitance: {:.6e} F = {:.6} mF\n",
                agg.mean,
                agg.mean * 1000.0
            ));
            out.push_str(&format!(
                "Min: {:.6e} F = {:.6} mF\n",
                agg.min,
                agg.min * 1000.0
            ));
            out.push_str(&format!(
                "Max: {:.6e} F = {:.6} mF\n",
                agg.max,
                agg.max * 1000.0
            ));
            out.push_str(&format!(
                "Std dev: {:.6e} F = {:.6} mF\n",
                agg.std_dev,
                agg.std_dev * 1000.0
            ));
            out.push_str(&format!(
                "Variation coefficient: {:.2}%\n",
                agg.variation_coefficient * 100.0
            ));
        } else {
            out.push_str(&format!(
                "Capacitance: {:.6e} F = {:.6} mF\n",
                agg.mean,
                agg.mean * 1000.0
            ));
        }
        out.push_str(&rule);
        out.push('\n');

        out
    }

    fn render_metadata(&self) -> String {
        let meta = &self.metadata;
        let mut out = String::from("Experiment parameters:\n");
        if let Some(v) = meta.init_e {
            out.push_str(&format!("  Init E: {v} V\n"));
        }
        if let Some(v) = meta.high_e {
            out.push_str(&format!("  High E: {v} V\n"));
        }
        if let Some(v) = meta.low_e {
            out.push_str(&format!("  Low E: {v} V\n"));
        }
        if let Some(v) = meta.scan_rate {
            out.push_str(&format!("  Scan rate: {v} V/s\n"));
        }
        if let Some(v) = meta.segment {
            out.push_str(&format!("  Segments: {v} (cycles: {})\n", v / 2));
        }
        if let Some(v) = meta.sample_interval {
            out.push_str(&format!("  Sample interval: {v} V\n"));
        }
        if let Some(v) = meta.sensitivity {
            out.push_str(&format!("  Sensitivity: {v:e} A/V\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;

    /// Two identical rectangular loops with segment = 4.
    fn synthetic_export(overflow_cycle: Option<usize>) -> String {
        let mut content = String::from(
            "Cyclic Voltammetry\n\
             Scan Rate (V/s) = 0.05\n\
             Segment = 4\n\
             Sensitivity (A/V) = 1e-5\n\
             Potential/V, Current/A\n",
        );
        for cycle in 0..2 {
            let i0 = if overflow_cycle == Some(cycle) { 1e-3 } else { 2e-6 };
            for k in 0..=10 {
                content.push_str(&format!("{:.3},{:e}\n", k as f64 * 0.05, i0));
            }
            for k in (0..10).rev() {
                content.push_str(&format!("{:.3},{:e}\n", k as f64 * 0.05, -i0));
            }
        }
        content
    }

    #[test]
    fn full_pipeline_produces_two_cycles() {
        let report = analyze(&synthetic_export(None), &AnalyzerOptions::default()).unwrap();

        assert_eq!(report.cycles.len(), 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.valid_capacitances.len(), 2);
        assert_eq!(report.results[0].cycle_num, 1);
        assert_eq!(report.results[1].cycle_num, 2);
        assert!(report.results.iter().all(|r| r.capacitance > 0.0));
        // With two values and one trimmed, the z-score tie breaks toward
        // dropping the first, so the mean is the second capacitance.
        assert_eq!(report.aggregate.mean, report.results[1].capacitance);
    }

    #[test]
    fn overflow_cycle_is_kept_but_flagged() {
        let report =
            analyze(&synthetic_export(Some(0)), &AnalyzerOptions::default()).unwrap();

        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].is_outlier);
        assert!(!report.results[1].is_outlier);
        assert_eq!(report.valid_capacitances.len(), 1);
    }

    #[test]
    fn all_overflow_fails_the_analysis() {
        let mut content = String::from(
            "Cyclic Voltammetry\nSegment = 2\nSensitivity (A/V) = 1e-5\nPotential/V, Current/A\n",
        );
        for k in 0..=10 {
            content.push_str(&format!("{:.3},1e-3\n", k as f64 * 0.05));
        }
        for k in (0..10).rev() {
            content.push_str(&format!("{:.3},-1e-3\n", k as f64 * 0.05));
        }

        assert!(matches!(
            analyze(&content, &AnalyzerOptions::default()),
            Err(AnalysisError::AllCyclesRejected)
        ));
    }

    #[test]
    fn file_read_failure_is_surfaced() {
        let missing = Path::new("/nonexistent/cv_export.txt");
        assert!(matches!(
            analyze_file(missing, &AnalyzerOptions::default()),
            Err(AnalysisError::FileRead { .. })
        ));
    }

    #[test]
    fn rendered_report_mentions_cycles_and_mean() {
        let report = analyze(&synthetic_export(None), &AnalyzerOptions::default()).unwrap();
        let text = report.render_text(DEFAULT_OUTLIER_COUNT);

        assert!(text.contains("Cycle 1:"));
        assert!(text.contains("Cycle 2:"));
        assert!(text.contains("Mean capacitance:"));
        assert!(text.contains("Valid cycles: 2"));
    }
}
