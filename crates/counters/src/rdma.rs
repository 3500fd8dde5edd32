use std::fs;
use std::io;
use std::ops::{Index, IndexMut};
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;

use crate::level::{Level, Slot};
use crate::registry::Handle;
use crate::CounterRegistry;

/// Bytes per GiB, the unit RDMA traffic is reported in
pub const GIB: f64 = (1u64 << 30) as f64;

/// Monotonic cumulative byte counter, e.g. a NIC port counter.
pub trait ByteCounterSource: Send {
    /// Current cumulative value in bytes
    fn read_bytes(&mut self) -> io::Result<u64>;

    /// Human readable origin, used in log messages
    fn describe(&self) -> String;
}

/// InfiniBand port counter exposed in sysfs.
///
/// The `port_xmit_data` and `port_rcv_data` counters count in units of four
/// bytes (one per lane), so the raw value is multiplied by four.
pub struct SysfsByteCounter {
    path: PathBuf,
}

impl SysfsByteCounter {
    const BYTES_PER_UNIT: u64 = 4;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn transmitted(device: &str) -> Self {
        Self::new(format!(
            "/sys/class/infiniband/{}/ports/1/counters/port_xmit_data",
            device
        ))
    }

    pub fn received(device: &str) -> Self {
        Self::new(format!(
            "/sys/class/infiniband/{}/ports/1/counters/port_rcv_data",
            device
        ))
    }
}

impl ByteCounterSource for SysfsByteCounter {
    fn read_bytes(&mut self) -> io::Result<u64> {
        let content = fs::read_to_string(&self.path)?;
        let units: u64 = content
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(units.saturating_mul(Self::BYTES_PER_UNIT))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Turns a cumulative byte counter into per-read deltas.
pub struct ByteDelta {
    source: Box<dyn ByteCounterSource>,
    previous: u64,
    warned: bool,
}

impl ByteDelta {
    /// Wraps `source` and takes the first reading as the baseline.
    pub fn new(source: Box<dyn ByteCounterSource>) -> Self {
        let mut delta = Self {
            source,
            previous: 0,
            warned: false,
        };
        delta.next_delta();
        delta
    }

    /// Bytes added since the previous call.
    ///
    /// A counter that went backwards (device reset) yields zero. A failed read
    /// yields zero and is reported once per source.
    pub fn next_delta(&mut self) -> u64 {
        match self.source.read_bytes() {
            Ok(value) => {
                let delta = value.saturating_sub(self.previous);
                self.previous = value;
                delta
            }
            Err(e) => {
                if !self.warned {
                    warn!(
                        "failed to read byte counter {}: {}",
                        self.source.describe(),
                        e
                    );
                    self.warned = true;
                }
                0
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdmaCounter {
    SentGb,
    RecvGb,
}

const RDMA_SLOTS: [Slot; RdmaCounter::COUNT] = [
    Slot::new("sent (GB)", Level::Release),
    Slot::new("received (GB)", Level::Release),
];

impl RdmaCounter {
    pub const COUNT: usize = 2;

    pub const ALL: [RdmaCounter; RdmaCounter::COUNT] = [RdmaCounter::SentGb, RdmaCounter::RecvGb];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn slot(self) -> &'static Slot {
        &RDMA_SLOTS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.slot().name
    }

    pub fn level(self) -> Level {
        self.slot().level
    }
}

/// Traffic since the previous sweep, in GiB, summed over all NICs.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RdmaValues([f64; RdmaCounter::COUNT]);

impl RdmaValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.0 = [0.0; RdmaCounter::COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (RdmaCounter, f64)> + '_ {
        RdmaCounter::ALL
            .iter()
            .map(move |&counter| (counter, self.0[counter.index()]))
    }
}

impl Index<RdmaCounter> for RdmaValues {
    type Output = f64;

    fn index(&self, counter: RdmaCounter) -> &f64 {
        &self.0[counter.index()]
    }
}

impl IndexMut<RdmaCounter> for RdmaValues {
    fn index_mut(&mut self, counter: RdmaCounter) -> &mut f64 {
        &mut self.0[counter.index()]
    }
}

pub(crate) struct RdmaEntry {
    sent: ByteDelta,
    received: ByteDelta,
}

impl RdmaEntry {
    pub(crate) fn contribute(&mut self, acc: &mut RdmaValues) {
        acc[RdmaCounter::SentGb] += self.sent.next_delta() as f64 / GIB;
        acc[RdmaCounter::RecvGb] += self.received.next_delta() as f64 / GIB;
    }
}

/// Registers a NIC's transmit/receive byte counters for as long as it lives.
pub struct RdmaCounters {
    handle: Handle,
    registry: Arc<CounterRegistry>,
}

impl RdmaCounters {
    pub fn new(
        registry: &Arc<CounterRegistry>,
        sent: Box<dyn ByteCounterSource>,
        received: Box<dyn ByteCounterSource>,
    ) -> Self {
        let entry = RdmaEntry {
            sent: ByteDelta::new(sent),
            received: ByteDelta::new(received),
        };
        let handle = registry.rdma().register(entry);
        Self {
            handle,
            registry: registry.clone(),
        }
    }

    /// Producer for port 1 of an InfiniBand device such as `mlx5_0`
    pub fn infiniband(registry: &Arc<CounterRegistry>, device: &str) -> Self {
        Self::new(
            registry,
            Box::new(SysfsByteCounter::transmitted(device)),
            Box::new(SysfsByteCounter::received(device)),
        )
    }
}

impl Drop for RdmaCounters {
    fn drop(&mut self) {
        self.registry.rdma().deregister(self.handle);
    }
}
