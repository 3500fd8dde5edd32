use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::level::{Level, Slot};
use crate::registry::Handle;
use crate::CounterRegistry;

/// Delta counters owned by each worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCounter {
    TxP,
    Latency,
    SsdPagesRead,
    SsdPagesWritten,
    RdmaPagesTx,
    RdmaPagesRx,
    MhMsgsHandled,
    MhMsgsRestarted,
    BtreeTraversals,
    BtreeRestarted,
    WRpcTried,
    WRpcRestarted,
    PpRounds,
    PpRdmaEvicted,
    PpRdmaReceived,
    PpLatencyIncomingRequests,
    PpLatencyCooling,
    PpLatencySelect,
    PpLatencySendRequests,
    PpLatencyIncomingResponses,
    PpLatencySendResponses,
}

const WORKER_SLOTS: [Slot; WorkerCounter::COUNT] = [
    Slot::new("tx/sec", Level::Release),
    Slot::new("latency", Level::Release),
    Slot::new("pages r (SSD)", Level::Release),
    Slot::new("pages w (SSD)", Level::Release),
    Slot::new("pages tx (RDMA)", Level::Csv),
    Slot::new("pages rx (RDMA)", Level::Csv),
    Slot::new("msg (h)", Level::Release),
    Slot::new("msg (r)", Level::Release),
    Slot::new("btree (t)", Level::Csv),
    Slot::new("btree (r)", Level::Csv),
    Slot::new("w_rpc_tried", Level::Csv),
    Slot::new("w_rpc_restarted", Level::Csv),
    Slot::new("pp_rounds", Level::Csv),
    Slot::new("pp_rdma_evicted", Level::Csv),
    Slot::new("pp_rdma_received", Level::Csv),
    Slot::new("pp_latency_p1_incoming_requests", Level::Csv),
    Slot::new("pp_latency_p2_cooling", Level::Csv),
    Slot::new("pp_latency_p3_select", Level::Csv),
    Slot::new("pp_latency_p4_send_requests", Level::Csv),
    Slot::new("pp_latency_p5_incoming_responses", Level::Csv),
    Slot::new("pp_latency_p6_send_responses", Level::Csv),
];

impl WorkerCounter {
    pub const COUNT: usize = 21;

    pub const ALL: [WorkerCounter; WorkerCounter::COUNT] = [
        WorkerCounter::TxP,
        WorkerCounter::Latency,
        WorkerCounter::SsdPagesRead,
        WorkerCounter::SsdPagesWritten,
        WorkerCounter::RdmaPagesTx,
        WorkerCounter::RdmaPagesRx,
        WorkerCounter::MhMsgsHandled,
        WorkerCounter::MhMsgsRestarted,
        WorkerCounter::BtreeTraversals,
        WorkerCounter::BtreeRestarted,
        WorkerCounter::WRpcTried,
        WorkerCounter::WRpcRestarted,
        WorkerCounter::PpRounds,
        WorkerCounter::PpRdmaEvicted,
        WorkerCounter::PpRdmaReceived,
        WorkerCounter::PpLatencyIncomingRequests,
        WorkerCounter::PpLatencyCooling,
        WorkerCounter::PpLatencySelect,
        WorkerCounter::PpLatencySendRequests,
        WorkerCounter::PpLatencyIncomingResponses,
        WorkerCounter::PpLatencySendResponses,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn slot(self) -> &'static Slot {
        &WORKER_SLOTS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.slot().name
    }

    pub fn level(self) -> Level {
        self.slot().level
    }
}

/// Atomic slot array shared between a worker and its registry entry.
#[derive(Debug, Default)]
pub struct WorkerSlots {
    counters: [AtomicU64; WorkerCounter::COUNT],
}

impl WorkerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, counter: WorkerCounter, value: u64) {
        self.counters[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    /// Current value of a slot without resetting it
    pub fn load(&self, counter: WorkerCounter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Moves every slot into `acc` and leaves zero behind.
    ///
    /// Each slot is read and cleared by a single atomic swap, so an increment
    /// lands either in this sweep or in a later one, never in both.
    pub fn drain_into(&self, acc: &mut WorkerValues) {
        for (slot, total) in self.counters.iter().zip(acc.0.iter_mut()) {
            *total += slot.swap(0, Ordering::AcqRel);
        }
    }
}

/// Per-sweep sums of the worker slots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerValues([u64; WorkerCounter::COUNT]);

impl WorkerValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.0 = [0; WorkerCounter::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkerCounter, u64)> + '_ {
        WorkerCounter::ALL
            .iter()
            .map(move |&counter| (counter, self.0[counter.index()]))
    }
}

impl Index<WorkerCounter> for WorkerValues {
    type Output = u64;

    fn index(&self, counter: WorkerCounter) -> &u64 {
        &self.0[counter.index()]
    }
}

impl IndexMut<WorkerCounter> for WorkerValues {
    fn index_mut(&mut self, counter: WorkerCounter) -> &mut u64 {
        &mut self.0[counter.index()]
    }
}

/// Counter producer for one worker thread.
///
/// Registers on construction and deregisters on drop. Increments are plain
/// relaxed atomic adds on storage owned by this producer; they never wait on
/// the profiler.
pub struct WorkerCounters {
    slots: Arc<WorkerSlots>,
    handle: Handle,
    registry: Arc<CounterRegistry>,
}

impl WorkerCounters {
    pub fn new(registry: &Arc<CounterRegistry>) -> Self {
        let slots = Arc::new(WorkerSlots::new());
        let handle = registry.workers().register(slots.clone());
        Self {
            slots,
            handle,
            registry: registry.clone(),
        }
    }

    #[inline]
    pub fn incr(&self, counter: WorkerCounter) {
        self.slots.add(counter, 1);
    }

    #[inline]
    pub fn incr_by(&self, counter: WorkerCounter, increment: u64) {
        self.slots.add(counter, increment);
    }

    /// Start timestamp for a latency slot, or `None` when the slot is hidden
    /// at the registry's active level and timing it would be wasted work.
    #[inline]
    pub fn time_point_for(&self, counter: WorkerCounter) -> Option<Instant> {
        if counter.level().is_visible_at(self.registry.level()) {
            Some(Instant::now())
        } else {
            None
        }
    }

    /// Adds the microseconds elapsed since `start` to `counter`.
    #[inline]
    pub fn record_elapsed(&self, counter: WorkerCounter, start: Option<Instant>) {
        if let Some(start) = start {
            self.incr_by(counter, start.elapsed().as_micros() as u64);
        }
    }

    /// Value accumulated since the last sweep
    pub fn pending(&self, counter: WorkerCounter) -> u64 {
        self.slots.load(counter)
    }
}

impl Drop for WorkerCounters {
    fn drop(&mut self) {
        self.registry.workers().deregister(self.handle);
    }
}
