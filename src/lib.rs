//! Capacitance extraction from cyclic-voltammetry (CV) instrument exports.
//!
//! The pipeline is a chain of pure stages: parse the text export into
//! metadata and a voltage/current series, segment the series into cycles at
//! voltage-direction reversals, integrate each cycle's hysteresis loop into
//! an enclosed charge and capacitance, then aggregate the per-cycle values
//! into a robust trimmed mean. Presentation concerns (plotting, tables,
//! electrode-area normalization) stay with the consumer of the
//! [`report::AnalysisReport`].

pub mod data;
pub mod error;
pub mod processing;
pub mod report;

pub use error::AnalysisError;
pub use report::{analyze, analyze_file, AnalysisReport, AnalyzerOptions};
