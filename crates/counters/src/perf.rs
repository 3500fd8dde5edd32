use std::collections::HashMap;

use log::warn;
use perf_events::PerfEvent;

use crate::cpu::HardwareCounters;

// Toggle failures are logged and the session keeps its last readings.
impl HardwareCounters for PerfEvent {
    fn start(&mut self) {
        if let Err(e) = self.start_counters() {
            warn!("failed to start hardware counters: {}", e);
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.stop_counters() {
            warn!("failed to stop hardware counters: {}", e);
        }
    }

    fn counters_map(&self) -> HashMap<String, f64> {
        PerfEvent::counters_map(self)
    }
}
