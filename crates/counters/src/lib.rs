//! # counters
//!
//! Counter producers and the registries the profiler sweeps.
//!
//! A process creates one [`CounterRegistry`] and shares it by `Arc`. Every
//! producer registers itself on construction and deregisters on drop:
//!
//! - [`WorkerCounters`]: per-thread delta counters, reset by each sweep
//! - [`BmCounters`]: gauges of a buffer manager, read without reset
//! - [`CpuCounters`]: a thread's hardware counter session
//! - [`RdmaCounters`]: NIC byte counters, reported as traffic per sweep
//!
//! Each category has its own mutex; producers never take it on their hot path.
//!
//! ```
//! use std::sync::Arc;
//! use counters::{CounterRegistry, Level, Snapshot, WorkerCounter, WorkerCounters};
//!
//! let registry = Arc::new(CounterRegistry::new(Level::Release));
//! let worker = WorkerCounters::new(&registry);
//! worker.incr(WorkerCounter::TxP);
//!
//! let mut snapshot = Snapshot::new();
//! registry.aggregate(&mut snapshot);
//! assert_eq!(snapshot.worker[WorkerCounter::TxP], 1);
//! ```

mod buffer_manager;
mod context;
mod cpu;
mod level;
#[cfg(target_os = "linux")]
mod perf;
mod rdma;
mod registry;
mod worker;

pub use buffer_manager::*;
pub use context::*;
pub use cpu::{is_worker_thread, CpuCounters, CpuValues, HardwareCounters, WORKER_THREAD_PREFIX};
pub use level::*;
pub use rdma::{
    ByteCounterSource, ByteDelta, RdmaCounter, RdmaCounters, RdmaValues, SysfsByteCounter, GIB,
};
pub use registry::{Category, Handle, Registry};
pub use worker::*;
