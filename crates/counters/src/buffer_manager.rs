use std::ops::{Index, IndexMut};
use std::sync::Arc;

use crate::level::{Level, Slot};
use crate::registry::Handle;
use crate::CounterRegistry;

/// Gauges exposed by a buffer manager.
///
/// Implementations return instantaneous values; the profiler never resets
/// them.
pub trait BufferManagerGauges: Send + Sync {
    fn free_pages(&self) -> u64;
    fn free_frames(&self) -> u64;
    fn dram_pool_size(&self) -> u64;
    fn global_epoch(&self) -> u64;
    fn consumed_pages(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BmCounter {
    FreePages,
    FreeFrames,
    DramPoolSize,
    PercUtilized,
    GlobalEpoch,
    ConsumedPages,
}

const BM_SLOTS: [Slot; BmCounter::COUNT] = [
    Slot::new("free pages", Level::Csv),
    Slot::new("free frames", Level::Csv),
    Slot::new("page pool", Level::Csv),
    Slot::new("perc. pages used", Level::Release),
    Slot::new("global epoch", Level::Release),
    Slot::new("consumed pages", Level::Release),
];

impl BmCounter {
    pub const COUNT: usize = 6;

    pub const ALL: [BmCounter; BmCounter::COUNT] = [
        BmCounter::FreePages,
        BmCounter::FreeFrames,
        BmCounter::DramPoolSize,
        BmCounter::PercUtilized,
        BmCounter::GlobalEpoch,
        BmCounter::ConsumedPages,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn slot(self) -> &'static Slot {
        &BM_SLOTS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.slot().name
    }

    pub fn level(self) -> Level {
        self.slot().level
    }
}

/// Share of the pool in use, in percent. Zero for an empty pool.
pub fn percent_utilized(pool_size: u64, free_pages: u64) -> u64 {
    if pool_size == 0 {
        return 0;
    }
    pool_size.saturating_sub(free_pages).saturating_mul(100) / pool_size
}

/// Gauge snapshot of all registered buffer managers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BmValues([u64; BmCounter::COUNT]);

impl BmValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.0 = [0; BmCounter::COUNT];
    }

    /// Folds one buffer manager's gauges into the snapshot.
    ///
    /// Page and frame counts add up across buffer managers; the epoch keeps
    /// the highest value seen. Call [`BmValues::finish`] once the sweep is
    /// done to derive the utilization.
    pub fn add_gauges(&mut self, gauges: &dyn BufferManagerGauges) {
        self[BmCounter::FreePages] += gauges.free_pages();
        self[BmCounter::FreeFrames] += gauges.free_frames();
        self[BmCounter::DramPoolSize] += gauges.dram_pool_size();
        self[BmCounter::ConsumedPages] += gauges.consumed_pages();
        let epoch = gauges.global_epoch();
        if epoch > self[BmCounter::GlobalEpoch] {
            self[BmCounter::GlobalEpoch] = epoch;
        }
    }

    pub fn finish(&mut self) {
        self[BmCounter::PercUtilized] =
            percent_utilized(self[BmCounter::DramPoolSize], self[BmCounter::FreePages]);
    }

    pub fn iter(&self) -> impl Iterator<Item = (BmCounter, u64)> + '_ {
        BmCounter::ALL
            .iter()
            .map(move |&counter| (counter, self.0[counter.index()]))
    }
}

impl Index<BmCounter> for BmValues {
    type Output = u64;

    fn index(&self, counter: BmCounter) -> &u64 {
        &self.0[counter.index()]
    }
}

impl IndexMut<BmCounter> for BmValues {
    fn index_mut(&mut self, counter: BmCounter) -> &mut u64 {
        &mut self.0[counter.index()]
    }
}

/// Registers a buffer manager's gauges with the profiler for as long as it
/// lives.
pub struct BmCounters {
    handle: Handle,
    registry: Arc<CounterRegistry>,
}

impl BmCounters {
    pub fn new(registry: &Arc<CounterRegistry>, gauges: Arc<dyn BufferManagerGauges>) -> Self {
        let handle = registry.buffer_managers().register(gauges);
        Self {
            handle,
            registry: registry.clone(),
        }
    }
}

impl Drop for BmCounters {
    fn drop(&mut self) {
        self.registry.buffer_managers().deregister(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedGauges {
        free_pages: AtomicU64,
        pool: u64,
        epoch: u64,
        consumed: u64,
    }

    impl FixedGauges {
        fn new(free_pages: u64, pool: u64, epoch: u64, consumed: u64) -> Self {
            Self {
                free_pages: AtomicU64::new(free_pages),
                pool,
                epoch,
                consumed,
            }
        }
    }

    impl BufferManagerGauges for FixedGauges {
        fn free_pages(&self) -> u64 {
            self.free_pages.load(Ordering::Relaxed)
        }
        fn free_frames(&self) -> u64 {
            self.pool / 2
        }
        fn dram_pool_size(&self) -> u64 {
            self.pool
        }
        fn global_epoch(&self) -> u64 {
            self.epoch
        }
        fn consumed_pages(&self) -> u64 {
            self.consumed
        }
    }

    #[rstest]
    #[case(1000, 250, 75)]
    #[case(1000, 1000, 0)]
    #[case(1000, 0, 100)]
    #[case(3, 2, 33)]
    #[case(0, 0, 0)]
    #[case(10, 20, 0)]
    fn test_percent_utilized(#[case] pool: u64, #[case] free: u64, #[case] expected: u64) {
        assert_eq!(percent_utilized(pool, free), expected);
    }

    #[test]
    fn test_snapshot_is_not_reset() {
        let registry = Arc::new(CounterRegistry::new(Level::Release));
        let gauges = Arc::new(FixedGauges::new(400, 1000, 7, 12));
        let _counters = BmCounters::new(&registry, gauges.clone());

        for _ in 0..2 {
            let mut acc = BmValues::new();
            registry.aggregate_buffer_managers(&mut acc);
            assert_eq!(acc[BmCounter::FreePages], 400);
            assert_eq!(acc[BmCounter::FreeFrames], 500);
            assert_eq!(acc[BmCounter::DramPoolSize], 1000);
            assert_eq!(acc[BmCounter::PercUtilized], 60);
            assert_eq!(acc[BmCounter::GlobalEpoch], 7);
            assert_eq!(acc[BmCounter::ConsumedPages], 12);
        }

        gauges.free_pages.store(100, Ordering::Relaxed);
        let mut acc = BmValues::new();
        registry.aggregate_buffer_managers(&mut acc);
        assert_eq!(acc[BmCounter::PercUtilized], 90);
    }

    #[test]
    fn test_multiple_buffer_managers_add_up() {
        let registry = Arc::new(CounterRegistry::new(Level::Release));
        let _a = BmCounters::new(&registry, Arc::new(FixedGauges::new(100, 1000, 3, 5)));
        let _b = BmCounters::new(&registry, Arc::new(FixedGauges::new(900, 1000, 9, 1)));

        let mut acc = BmValues::new();
        registry.aggregate_buffer_managers(&mut acc);
        assert_eq!(acc[BmCounter::FreePages], 1000);
        assert_eq!(acc[BmCounter::DramPoolSize], 2000);
        assert_eq!(acc[BmCounter::PercUtilized], 50);
        assert_eq!(acc[BmCounter::GlobalEpoch], 9);
        assert_eq!(acc[BmCounter::ConsumedPages], 6);
    }

    #[test]
    fn test_no_buffer_manager_yields_zero_utilization() {
        let registry = CounterRegistry::new(Level::Release);
        let mut acc = BmValues::new();
        registry.aggregate_buffer_managers(&mut acc);
        assert_eq!(acc, BmValues::new());
    }
}
