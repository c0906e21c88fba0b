use std::path::PathBuf;

/// Errors that abort a whole-file analysis.
///
/// Per-cycle problems (current overflow, degenerate splits) are not errors:
/// they are recorded on the individual [`crate::processing::capacitance::CycleResult`]
/// and the rest of the pipeline proceeds. Only when no usable cycle remains
/// does the analysis fail with [`AnalysisError::AllCyclesRejected`].
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file does not contain a 'Cyclic Voltammetry' marker; not a CV export")]
    NotCyclicVoltammetry,

    #[error("no voltage/current data: {0}")]
    NoData(String),

    #[error("too few samples to form cycles ({count} found, at least 2 required)")]
    TooFewSamples { count: usize },

    #[error("every cycle was rejected as overflow or degenerate; no valid capacitance")]
    AllCyclesRejected,
}
