use std::path::PathBuf;

use thiserror::Error;

/// Errors of the profiler's output sinks
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("failed to open CSV file {path:?}: {source}")]
    CsvOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write CSV file {path:?}: {source}")]
    CsvWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}
