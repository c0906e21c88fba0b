use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cvcap::processing::statistics::DEFAULT_OUTLIER_COUNT;
use cvcap::{analyze_file, AnalyzerOptions};

/// Extract double-layer capacitance from a cyclic-voltammetry export.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the instrument text export.
    file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let options = AnalyzerOptions::default();

    match analyze_file(&cli.file, &options) {
        Ok(report) => {
            print!("{}", report.render_text(DEFAULT_OUTLIER_COUNT));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
