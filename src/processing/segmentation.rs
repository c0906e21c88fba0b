use serde::{Deserialize, Serialize};

use crate::data::Sample;
use crate::error::AnalysisError;

/// Half-scan count assumed when the export preamble lacks a `Segment` key.
pub const DEFAULT_SEGMENT: u32 = 10;

/// One full voltammetric cycle: a contiguous run of samples covering an
/// up-sweep and the following down-sweep. Always holds at least 2 samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub samples: Vec<Sample>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-sample scan direction. The first sample has no previous point to
/// compare against, so it carries `Undefined`; flat runs copy the previous
/// label so they never register as reversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undefined,
    Ascending,
    Descending,
}

/// Partition the sample series into cycles using voltage-direction reversals.
///
/// The instrument records each half-scan as one monotonic voltage run, so a
/// genuine reversal (ascending to descending or back) marks a half-scan
/// boundary. The instrument-reported `segment` count caps how many
/// boundaries are honored, and half-scans are paired up afterwards into
/// full cycles when the raw split produced more pieces than `segment / 2`.
pub fn split_into_cycles(samples: &[Sample], segment: Option<u32>) -> Result<Vec<Cycle>, AnalysisError> {
    if samples.len() < 2 {
        return Err(AnalysisError::TooFewSamples {
            count: samples.len(),
        });
    }

    let segment = segment.unwrap_or(DEFAULT_SEGMENT) as usize;
    let expected_cycles = segment / 2;

    let directions = label_directions(samples);

    // Boundary collection stops once `segment` boundaries (index 0 included)
    // have been accumulated; the series end always closes the last slice.
    let mut boundaries = vec![0usize];
    for i in 1..directions.len() {
        if is_reversal(directions[i - 1], directions[i]) && boundaries.len() < segment {
            boundaries.push(i);
        }
    }
    boundaries.push(samples.len());

    let mut cycles: Vec<Cycle> = Vec::new();
    for window in boundaries.windows(2) {
        let slice = &samples[window[0]..window[1]];
        if slice.len() >= 2 {
            cycles.push(Cycle {
                samples: slice.to_vec(),
            });
        }
    }

    if cycles.len() > expected_cycles {
        cycles = pair_half_scans(cycles);
    }

    Ok(cycles)
}

fn label_directions(samples: &[Sample]) -> Vec<Direction> {
    let mut directions = Vec::with_capacity(samples.len());
    directions.push(Direction::Undefined);

    for pair in samples.windows(2) {
        let prev = pair[0].voltage;
        let curr = pair[1].voltage;
        let label = if curr > prev {
            Direction::Ascending
        } else if curr < prev {
            Direction::Descending
        } else {
            *directions.last().unwrap_or(&Direction::Undefined)
        };
        directions.push(label);
    }

    directions
}

fn is_reversal(prev: Direction, curr: Direction) -> bool {
    prev != curr && prev != Direction::Undefined && curr != Direction::Undefined
}

/// Merge adjacent half-scans (forward, reverse) into full cycles.
///
/// A trailing unpaired half-scan is dropped, matching the instrument
/// convention that a cycle is always an up+down pair; the discard is logged
/// so callers can see data was left out at file end. An empty pairing
/// result falls back to the unpaired list rather than failing.
fn pair_half_scans(half_scans: Vec<Cycle>) -> Vec<Cycle> {
    let mut paired = Vec::with_capacity(half_scans.len() / 2);

    let mut i = 0;
    while i + 1 < half_scans.len() {
        let mut combined = half_scans[i].samples.clone();
        combined.extend_from_slice(&half_scans[i + 1].samples);
        if combined.len() > 1 {
            paired.push(Cycle { samples: combined });
        }
        i += 2;
    }

    if half_scans.len() % 2 == 1 {
        tracing::warn!(
            index = half_scans.len() - 1,
            "odd half-scan count; trailing half-scan dropped"
        );
    }

    if paired.is_empty() {
        return half_scans;
    }
    paired
}
