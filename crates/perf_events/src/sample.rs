use std::collections::HashMap;

use plain::Plain;

/// A counter value as returned by `read(2)` on a perf event opened with
/// `PERF_FORMAT_TOTAL_TIME_ENABLED | PERF_FORMAT_TOTAL_TIME_RUNNING`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub value: u64,
    pub time_enabled: u64,
    pub time_running: u64,
}
unsafe impl Plain for Sample {}

impl Sample {
    pub const SIZE: usize = std::mem::size_of::<Sample>();

    /// Parses a sample from the raw bytes of a read.
    pub fn from_bytes(bytes: &[u8]) -> Option<Sample> {
        let mut sample = Sample::default();
        plain::copy_from_bytes(&mut sample, bytes).ok()?;
        Some(sample)
    }

    /// Counter increase since `prev`, extrapolated over the time the event
    /// was enabled but multiplexed off the PMU.
    ///
    /// Returns NaN when the event was never scheduled in between.
    pub fn scaled_delta(&self, prev: &Sample) -> f64 {
        let value = self.value.wrapping_sub(prev.value) as f64;
        let enabled = self.time_enabled.wrapping_sub(prev.time_enabled) as f64;
        let running = self.time_running.wrapping_sub(prev.time_running) as f64;
        value * (enabled / running)
    }
}

/// Builds the named reading map for one counting window.
///
/// Besides the raw event counts the map carries `IPC`, `CPU` (task clock
/// divided by wall time, i.e. utilized CPUs) and `GHz`. Derived entries are
/// NaN when their inputs are missing or zero.
pub fn counters_map(deltas: &[(&str, f64)], wall_ns: f64) -> HashMap<String, f64> {
    let mut map: HashMap<String, f64> = deltas
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect();

    let get = |name: &str| map.get(name).copied().unwrap_or(f64::NAN);
    let cycles = get("cycles");
    let instructions = get("instructions");
    let task_clock = get("task-clock");

    map.insert("IPC".to_string(), instructions / cycles);
    map.insert("CPU".to_string(), task_clock / wall_ns);
    map.insert("GHz".to_string(), cycles / task_clock);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: u64, time_enabled: u64, time_running: u64) -> Sample {
        Sample {
            value,
            time_enabled,
            time_running,
        }
    }

    #[test]
    fn test_scaled_delta_without_multiplexing() {
        let prev = sample(100, 1000, 1000);
        let cur = sample(600, 2000, 2000);
        assert_eq!(cur.scaled_delta(&prev), 500.0);
    }

    #[test]
    fn test_scaled_delta_corrects_for_multiplexing() {
        // Counted only half of the enabled time
        let prev = sample(0, 0, 0);
        let cur = sample(300, 1000, 500);
        assert_eq!(cur.scaled_delta(&prev), 600.0);
    }

    #[test]
    fn test_never_scheduled_is_nan() {
        let prev = sample(0, 1000, 0);
        let cur = sample(0, 2000, 0);
        assert!(cur.scaled_delta(&prev).is_nan());
    }

    #[test]
    fn test_from_bytes() {
        let mut bytes = Vec::new();
        for v in [7u64, 11, 13] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        assert_eq!(Sample::from_bytes(&bytes), Some(sample(7, 11, 13)));
        assert_eq!(Sample::from_bytes(&bytes[..8]), None);
    }

    #[test]
    fn test_counters_map_derived_entries() {
        let map = counters_map(
            &[
                ("cycles", 2_000.0),
                ("instructions", 3_000.0),
                ("task-clock", 1_000.0),
            ],
            2_000.0,
        );
        assert_eq!(map["cycles"], 2_000.0);
        assert_eq!(map["IPC"], 1.5);
        assert_eq!(map["CPU"], 0.5);
        assert_eq!(map["GHz"], 2.0);
    }

    #[test]
    fn test_counters_map_idle_window() {
        let map = counters_map(&[("cycles", 0.0), ("instructions", 0.0)], 1_000.0);
        assert!(map["IPC"].is_nan());
        assert!(map["CPU"].is_nan());
    }
}
