use std::sync::Arc;

use crate::buffer_manager::{BmValues, BufferManagerGauges};
use crate::cpu::{CpuEntry, CpuValues};
use crate::level::Level;
use crate::rdma::{RdmaEntry, RdmaValues};
use crate::registry::{Category, Registry};
use crate::worker::{WorkerSlots, WorkerValues};

/// One registry per counter category, created once per process and shared by
/// `Arc` with every producer and with the profiler.
pub struct CounterRegistry {
    level: Level,
    workers: Registry<Arc<WorkerSlots>>,
    buffer_managers: Registry<Arc<dyn BufferManagerGauges>>,
    cpus: Registry<CpuEntry>,
    rdma: Registry<RdmaEntry>,
}

impl CounterRegistry {
    /// Creates empty registries; `level` is the active visibility threshold.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            workers: Registry::new(Category::Worker),
            buffer_managers: Registry::new(Category::BufferManager),
            cpus: Registry::new(Category::Cpu),
            rdma: Registry::new(Category::Rdma),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Number of live producers in a category
    pub fn producer_count(&self, category: Category) -> usize {
        match category {
            Category::Worker => self.workers.len(),
            Category::BufferManager => self.buffer_managers.len(),
            Category::Cpu => self.cpus.len(),
            Category::Rdma => self.rdma.len(),
        }
    }

    /// Drains every worker's delta counters into `acc`.
    pub fn aggregate_workers(&self, acc: &mut WorkerValues) -> usize {
        self.workers.aggregate(acc, |slots, acc| slots.drain_into(acc))
    }

    /// Reads every buffer manager's gauges into `acc`.
    pub fn aggregate_buffer_managers(&self, acc: &mut BmValues) -> usize {
        let visited = self
            .buffer_managers
            .aggregate(acc, |gauges, acc| acc.add_gauges(gauges.as_ref()));
        acc.finish();
        visited
    }

    /// Cycles the hardware counting window of every worker thread and sums
    /// the readings into `acc`.
    pub fn aggregate_cpus(&self, acc: &mut CpuValues) -> usize {
        self.cpus.aggregate(acc, |entry, acc| entry.contribute(acc))
    }

    /// Collects the traffic of every NIC since the previous sweep.
    pub fn aggregate_rdma(&self, acc: &mut RdmaValues) -> usize {
        self.rdma.aggregate(acc, |entry, acc| entry.contribute(acc))
    }

    /// Runs one sweep per category in the fixed order worker, buffer
    /// manager, CPU, RDMA. Each category lock is taken and released in turn.
    pub fn aggregate(&self, snapshot: &mut Snapshot) {
        self.aggregate_workers(&mut snapshot.worker);
        self.aggregate_buffer_managers(&mut snapshot.buffer_manager);
        self.aggregate_cpus(&mut snapshot.cpu);
        self.aggregate_rdma(&mut snapshot.rdma);
    }

    pub(crate) fn workers(&self) -> &Registry<Arc<WorkerSlots>> {
        &self.workers
    }

    pub(crate) fn buffer_managers(&self) -> &Registry<Arc<dyn BufferManagerGauges>> {
        &self.buffer_managers
    }

    pub(crate) fn cpus(&self) -> &Registry<CpuEntry> {
        &self.cpus
    }

    pub(crate) fn rdma(&self) -> &Registry<RdmaEntry> {
        &self.rdma
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new(Level::default())
    }
}

/// Result of one sweep over all categories.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub worker: WorkerValues,
    pub buffer_manager: BmValues,
    pub cpu: CpuValues,
    pub rdma: RdmaValues,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.worker.clear();
        self.buffer_manager.clear();
        self.cpu.clear();
        self.rdma.clear();
    }
}
