use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{Metadata, Sample};
use crate::processing::segmentation::Cycle;

/// Current-range fallback (A/V) when the preamble lacks a Sensitivity key.
pub const DEFAULT_SENSITIVITY: f64 = 1e-5;

/// A cycle is rejected when any |current| exceeds this many multiples of
/// the instrument sensitivity.
pub const DEFAULT_OVERFLOW_FACTOR: f64 = 10.0;

/// Scan-rate fallback (V/s) when the preamble lacks a Scan Rate key.
pub const DEFAULT_SCAN_RATE: f64 = 0.01;

/// Forward and reverse branches are matched on voltages rounded at the
/// sixth decimal (this scale). Both branches sample the same nominal
/// voltage grid, but floating-point accumulation drifts by far less than
/// any physical sample interval, so rounding here reunites them. Changing
/// this granularity requires re-validation against the sample interval.
pub const VOLTAGE_KEY_SCALE: f64 = 1e6;

/// Outcome of analyzing one cycle. An outlier keeps zeroed area and
/// capacitance plus a reason and warning explaining the exclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// 1-based cycle number.
    pub cycle_num: u32,
    /// Enclosed charge between the branches (C). Zero for outliers.
    pub area: f64,
    /// Double-layer capacitance (F). Zero for outliers.
    pub capacitance: f64,
    pub is_outlier: bool,
    pub outlier_reason: Option<String>,
    pub warning: Option<String>,
}

/// Compute the capacitance of a single cycle.
///
/// Returns `None` for degenerate cycles (fewer than 2 samples, an unusable
/// forward/reverse split, a zero scan rate, or a flat voltage range); the
/// caller skips those and continues. A sensitivity overflow is not
/// degenerate: it produces an outlier result carrying its reason.
pub fn compute_cycle(
    cycle_num: u32,
    cycle: &Cycle,
    metadata: &Metadata,
    overflow_factor: f64,
) -> Option<CycleResult> {
    if cycle.len() < 2 {
        return None;
    }

    let sensitivity = metadata.sensitivity.unwrap_or(DEFAULT_SENSITIVITY);
    let threshold = sensitivity * overflow_factor;

    if cycle.samples.iter().any(|s| s.current.abs() > threshold) {
        tracing::debug!(cycle_num, threshold, "current overflow; cycle rejected");
        return Some(CycleResult {
            cycle_num,
            area: 0.0,
            capacitance: 0.0,
            is_outlier: true,
            outlier_reason: Some("current overflow".to_string()),
            warning: Some(format!(
                "current exceeded {overflow_factor}x the sensitivity range; cycle ignored"
            )),
        });
    }

    let (forward, reverse) = split_forward_reverse(&cycle.samples);
    if forward.is_empty() || reverse.is_empty() {
        return None;
    }

    let area = loop_area(forward, reverse);

    let scan_rate = metadata.scan_rate.unwrap_or(DEFAULT_SCAN_RATE);
    if scan_rate == 0.0 {
        return None;
    }

    let v_max = forward.iter().map(|s| s.voltage).fold(f64::NEG_INFINITY, f64::max);
    let v_min = forward.iter().map(|s| s.voltage).fold(f64::INFINITY, f64::min);
    let voltage_range = v_max - v_min;
    if voltage_range == 0.0 {
        return None;
    }

    let capacitance = area / (2.0 * scan_rate * voltage_range);

    Some(CycleResult {
        cycle_num,
        area,
        capacitance,
        is_outlier: false,
        outlier_reason: None,
        warning: None,
    })
}

/// Split a cycle at the first sample attaining its maximum voltage. The
/// apex sample belongs to both halves, closing the loop.
fn split_forward_reverse(samples: &[Sample]) -> (&[Sample], &[Sample]) {
    if samples.len() < 2 {
        return (&[], &[]);
    }

    let mut max_idx = 0;
    let mut max_voltage = samples[0].voltage;
    for (i, s) in samples.iter().enumerate() {
        if s.voltage > max_voltage {
            max_voltage = s.voltage;
            max_idx = i;
        }
    }

    (&samples[..=max_idx], &samples[max_idx..])
}

/// Enclosed area between the forward and reverse branches, integrated over
/// voltage with trapezoids on the vertical current gap.
///
/// Forward pairs contribute only when both endpoint voltages also occur in
/// the reverse branch (after rounding); asymmetric sampling contributes
/// nothing rather than extrapolating.
fn loop_area(forward: &[Sample], reverse: &[Sample]) -> f64 {
    let reverse_lookup: HashMap<i64, f64> = reverse
        .iter()
        .map(|s| (voltage_key(s.voltage), s.current))
        .collect();

    let mut area = 0.0;
    for pair in forward.windows(2) {
        let (v1, i1) = (pair[0].voltage, pair[0].current);
        let (v2, i2) = (pair[1].voltage, pair[1].current);

        let (Some(&ir1), Some(&ir2)) = (
            reverse_lookup.get(&voltage_key(v1)),
            reverse_lookup.get(&voltage_key(v2)),
        ) else {
            continue;
        };

        let dv = (v2 - v1).abs();
        let gap_avg = ((i1 - ir1) + (i2 - ir2)) / 2.0;
        area += gap_avg * dv;
    }

    area.abs()
}

fn voltage_key(voltage: f64) -> i64 {
    (voltage * VOLTAGE_KEY_SCALE).round() as i64
}
