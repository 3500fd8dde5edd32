//! Synthetic key-value workload driving the demo binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use counters::{BufferManagerGauges, CounterRegistry, CpuCounters, WorkerCounter, WorkerCounters};
use profiler::{CsvRecord, WorkloadInfo};
use time::macros::format_description;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Pages reclaimed per page-provider round
const EVICTION_BATCH: u64 = 64;

/// One in this many accesses misses the buffer pool
const MISS_INTERVAL: u64 = 64;

#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub elements: u64,
    /// Share of lookups in percent
    pub read_ratio: u64,
}

/// Page pool bookkeeping without any actual pages behind it.
pub struct SimulatedBufferManager {
    pool_pages: u64,
    free_pages: AtomicU64,
    free_frames: AtomicU64,
    epoch: AtomicU64,
    consumed: AtomicU64,
}

impl SimulatedBufferManager {
    pub fn new(pool_pages: u64) -> Self {
        Self {
            pool_pages,
            free_pages: AtomicU64::new(pool_pages),
            free_frames: AtomicU64::new(pool_pages),
            epoch: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        }
    }

    /// Takes one page from the pool; `false` when the pool is exhausted.
    pub fn allocate(&self) -> bool {
        let taken = self
            .free_pages
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| free.checked_sub(1))
            .is_ok();
        if taken {
            self.consumed.fetch_add(1, Ordering::Relaxed);
            let _ = self
                .free_frames
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| free.checked_sub(1));
        }
        taken
    }

    /// Returns up to `pages` pages to the pool and starts a new epoch.
    /// Yields the number of pages actually freed.
    pub fn evict(&self, pages: u64) -> u64 {
        let freed = self
            .free_pages
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |free| {
                Some((free + pages).min(self.pool_pages))
            })
            .map(|before| (before + pages).min(self.pool_pages) - before)
            .unwrap_or(0);
        self.free_frames.fetch_add(freed, Ordering::Relaxed);
        self.epoch.fetch_add(1, Ordering::Relaxed);
        freed
    }
}

impl BufferManagerGauges for SimulatedBufferManager {
    fn free_pages(&self) -> u64 {
        self.free_pages.load(Ordering::Relaxed)
    }

    fn free_frames(&self) -> u64 {
        self.free_frames.load(Ordering::Relaxed)
    }

    fn dram_pool_size(&self) -> u64 {
        self.pool_pages
    }

    fn global_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    fn consumed_pages(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}

/// xorshift64*
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}

#[cfg(target_os = "linux")]
fn attach_cpu_counters(registry: &Arc<CounterRegistry>, thread_name: &str) -> Option<CpuCounters> {
    match perf_events::PerfEvent::new() {
        Ok(session) => Some(CpuCounters::new(registry, thread_name, Box::new(session))),
        Err(err) => {
            log::warn!("Hardware counters unavailable for {}: {}", thread_name, err);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn attach_cpu_counters(_registry: &Arc<CounterRegistry>, thread_name: &str) -> Option<CpuCounters> {
    log::warn!("Hardware counters unavailable for {}: unsupported platform", thread_name);
    None
}

fn run_worker(
    id: u64,
    registry: Arc<CounterRegistry>,
    buffer_manager: Arc<SimulatedBufferManager>,
    spec: WorkloadSpec,
    cpu_counters: bool,
    token: CancellationToken,
) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    let counters = WorkerCounters::new(&registry);
    let _cpu = if cpu_counters {
        attach_cpu_counters(&registry, &name)
    } else {
        None
    };

    let mut rng = Rng::new(0x9e37_79b9_7f4a_7c15 ^ id);
    let mut values = vec![0u64; 4096];
    let mut checksum = 0u64;

    while !token.is_cancelled() {
        let start = counters.time_point_for(WorkerCounter::Latency);
        let key = rng.next() % spec.elements;
        let slot = (key % values.len() as u64) as usize;

        counters.incr(WorkerCounter::BtreeTraversals);
        if rng.next() % 100 < spec.read_ratio {
            checksum ^= values[slot];
        } else {
            values[slot] = key;
        }

        if key % MISS_INTERVAL == 0 {
            counters.incr(WorkerCounter::SsdPagesRead);
            if !buffer_manager.allocate() {
                let round = counters.time_point_for(WorkerCounter::PpLatencyCooling);
                let freed = buffer_manager.evict(EVICTION_BATCH);
                counters.incr(WorkerCounter::PpRounds);
                counters.incr_by(WorkerCounter::SsdPagesWritten, freed);
                counters.record_elapsed(WorkerCounter::PpLatencyCooling, round);
            }
        }

        counters.record_elapsed(WorkerCounter::Latency, start);
        counters.incr(WorkerCounter::TxP);
    }

    log::debug!("{} stopped (checksum {:x})", name, checksum);
}

/// Starts `count` threads named `worker_<id>` that run until `token` is
/// cancelled.
pub fn spawn_workers(
    count: usize,
    registry: &Arc<CounterRegistry>,
    buffer_manager: &Arc<SimulatedBufferManager>,
    spec: WorkloadSpec,
    cpu_counters: bool,
    token: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    (0..count as u64)
        .map(|id| {
            let registry = registry.clone();
            let buffer_manager = buffer_manager.clone();
            let token = token.clone();
            thread::Builder::new()
                .name(format!("worker_{}", id))
                .spawn(move || run_worker(id, registry, buffer_manager, spec, cpu_counters, token))
                .with_context(|| format!("failed to spawn worker {}", id))
        })
        .collect()
}

fn format_time() -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&format)
        .unwrap_or_else(|_| "00:00:00".to_string())
}

/// Workload columns: name, element count, read ratio and wall-clock time.
pub struct KvWorkloadInfo {
    name: String,
    spec: WorkloadSpec,
}

impl KvWorkloadInfo {
    pub fn new(name: impl Into<String>, spec: WorkloadSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

impl WorkloadInfo for KvWorkloadInfo {
    fn header(&self) -> Vec<String> {
        ["workload", "elements", "read ratio", "time"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn row(&mut self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.spec.elements.to_string(),
            self.spec.read_ratio.to_string(),
            format_time(),
        ]
    }

    fn csv_header(&self, record: &mut CsvRecord) {
        record.push("Workload");
        record.push("Elements");
        record.push("ReadRatio");
        record.push("Timestamp");
    }

    fn csv_row(&mut self, record: &mut CsvRecord) {
        record.push(&self.name);
        record.push(self.spec.elements);
        record.push(self.spec.read_ratio);
        record.push(format_time());
    }
}
