//! # perf_events
//!
//! Per-thread hardware performance counters on top of `perf_event_open(2)`.
//!
//! A [`PerfEvent`] opens a fixed set of events for the calling thread and
//! counts in windows delimited by `start_counters` / `stop_counters`. Readings
//! are corrected for PMU multiplexing using the enabled and running times
//! reported by the kernel.
//!

mod sample;
#[cfg(target_os = "linux")]
mod session;

pub use sample::*;
#[cfg(target_os = "linux")]
pub use session::*;

use thiserror::Error;

/// Errors that can occur when opening or reading perf events
#[derive(Error, Debug)]
pub enum PerfEventError {
    #[error("failed to open perf event {name}: {source}")]
    OpenError {
        name: &'static str,
        source: std::io::Error,
    },

    #[error("failed to {op} perf event {name}: {source}")]
    IoctlError {
        op: &'static str,
        name: &'static str,
        source: std::io::Error,
    },

    #[error("failed to read perf event {name}: {source}")]
    ReadError {
        name: &'static str,
        source: std::io::Error,
    },

    #[error("short read of {len} bytes from perf event {name}")]
    ShortRead { name: &'static str, len: usize },
}
