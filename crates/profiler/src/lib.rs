//! # profiler
//!
//! Periodic reporting over the counter registries of the `counters` crate.
//!
//! A [`Profiler`] sweeps every counter category once per tick, derives the
//! per-transaction ratios and writes the result to a console table and,
//! optionally, an append-only CSV file.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use counters::{CounterRegistry, Level};
//! use profiler::{NoWorkload, Profiler, ProfilerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let registry = Arc::new(CounterRegistry::new(Level::Release));
//! let profiler = Profiler::new(registry, Box::new(NoWorkload), ProfilerConfig::default());
//! let handle = profiler.start(CancellationToken::new());
//! // ... run the workload ...
//! let ticks = handle.stop().await?;
//! # let _ = ticks;
//! # Ok(())
//! # }
//! ```

mod config;
mod csv;
mod error;
pub mod format;
mod profiling;
pub mod report;
mod supervisor;
mod table;
mod workload;

pub use config::*;
pub use csv::*;
pub use error::*;
pub use profiling::*;
pub use supervisor::*;
pub use table::*;
pub use workload::*;
