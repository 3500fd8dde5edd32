use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::Handle;
use crate::CounterRegistry;

/// Hardware performance counter session owned by one thread.
///
/// The profiler only ever stops a session, reads it and starts it again, all
/// while holding the CPU registry lock.
pub trait HardwareCounters: Send {
    /// Opens a new counting window
    fn start(&mut self);

    /// Closes the current counting window
    fn stop(&mut self);

    /// Named readings for the last closed window. Values may be NaN when a
    /// counter was never scheduled during the window.
    fn counters_map(&self) -> HashMap<String, f64>;
}

/// Threads whose name starts with this prefix contribute to CPU sweeps.
pub const WORKER_THREAD_PREFIX: &str = "worker";

pub fn is_worker_thread(name: &str) -> bool {
    name.starts_with(WORKER_THREAD_PREFIX)
}

pub(crate) struct CpuEntry {
    thread_name: String,
    session: Box<dyn HardwareCounters>,
}

impl CpuEntry {
    /// Stop, read, restart. NaN readings count as zero.
    pub(crate) fn contribute(&mut self, acc: &mut CpuValues) {
        if !is_worker_thread(&self.thread_name) {
            return;
        }

        self.session.stop();
        for (name, value) in self.session.counters_map() {
            acc.add(&name, if value.is_nan() { 0.0 } else { value });
        }
        self.session.start();
    }
}

/// Sums of named hardware readings across worker threads.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CpuValues {
    values: HashMap<String, f64>,
}

impl CpuValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, value: f64) {
        *self.values.entry(name.to_string()).or_insert(0.0) += value;
    }

    /// Summed reading for `name`, zero if no worker reported it
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Registers a thread's hardware counter session for as long as it lives.
///
/// The session is handed over to the registry; dropping the producer
/// deregisters and drops it.
pub struct CpuCounters {
    handle: Handle,
    registry: Arc<CounterRegistry>,
}

impl CpuCounters {
    /// Starts the first counting window and registers the session.
    pub fn new(
        registry: &Arc<CounterRegistry>,
        thread_name: impl Into<String>,
        mut session: Box<dyn HardwareCounters>,
    ) -> Self {
        session.start();
        let handle = registry.cpus().register(CpuEntry {
            thread_name: thread_name.into(),
            session,
        });
        Self {
            handle,
            registry: registry.clone(),
        }
    }

    pub fn thread_name(&self) -> String {
        self.registry
            .cpus()
            .with(self.handle, |entry| entry.thread_name.clone())
    }
}

impl Drop for CpuCounters {
    fn drop(&mut self) {
        if let Some(mut entry) = self.registry.cpus().deregister(self.handle) {
            entry.session.stop();
        }
    }
}
