//! Hardware counter session for the calling thread.

use std::collections::HashMap;
use std::io;
use std::time::Instant;

use perf_event_open_sys as sys;

use crate::{counters_map, PerfEventError, Sample};

/// A single event to count: display name plus perf type/config pair.
#[derive(Debug, Clone, Copy)]
pub struct EventSpec {
    pub name: &'static str,
    pub type_: u32,
    pub config: u64,
}

const fn hw_cache(cache: u32, op: u32, result: u32) -> u64 {
    cache as u64 | ((op as u64) << 8) | ((result as u64) << 16)
}

/// Events counted by [`PerfEvent::new`]
pub fn default_events() -> Vec<EventSpec> {
    vec![
        EventSpec {
            name: "cycles",
            type_: sys::bindings::PERF_TYPE_HARDWARE,
            config: sys::bindings::PERF_COUNT_HW_CPU_CYCLES as u64,
        },
        EventSpec {
            name: "instructions",
            type_: sys::bindings::PERF_TYPE_HARDWARE,
            config: sys::bindings::PERF_COUNT_HW_INSTRUCTIONS as u64,
        },
        EventSpec {
            name: "L1-misses",
            type_: sys::bindings::PERF_TYPE_HW_CACHE,
            config: hw_cache(
                sys::bindings::PERF_COUNT_HW_CACHE_L1D,
                sys::bindings::PERF_COUNT_HW_CACHE_OP_READ,
                sys::bindings::PERF_COUNT_HW_CACHE_RESULT_MISS,
            ),
        },
        EventSpec {
            name: "LLC-misses",
            type_: sys::bindings::PERF_TYPE_HARDWARE,
            config: sys::bindings::PERF_COUNT_HW_CACHE_MISSES as u64,
        },
        EventSpec {
            name: "branch-misses",
            type_: sys::bindings::PERF_TYPE_HARDWARE,
            config: sys::bindings::PERF_COUNT_HW_BRANCH_MISSES as u64,
        },
        EventSpec {
            name: "task-clock",
            type_: sys::bindings::PERF_TYPE_SOFTWARE,
            config: sys::bindings::PERF_COUNT_SW_TASK_CLOCK as u64,
        },
    ]
}

#[derive(Debug, Clone, Copy)]
enum Toggle {
    Reset,
    Enable,
    Disable,
}

impl Toggle {
    fn as_str(self) -> &'static str {
        match self {
            Toggle::Reset => "reset",
            Toggle::Enable => "enable",
            Toggle::Disable => "disable",
        }
    }
}

/// One open perf event file descriptor and its window boundaries.
struct Counter {
    name: &'static str,
    fd: i32,
    prev: Sample,
    data: Sample,
}

impl Counter {
    fn open(event: &EventSpec) -> Result<Self, PerfEventError> {
        let mut attr = sys::bindings::perf_event_attr::default();
        attr.size = std::mem::size_of::<sys::bindings::perf_event_attr>() as u32;
        attr.type_ = event.type_;
        attr.config = event.config;
        attr.set_disabled(1);
        attr.set_inherit(0);
        attr.set_exclude_kernel(1);
        attr.set_exclude_hv(1);
        attr.read_format = (sys::bindings::PERF_FORMAT_TOTAL_TIME_ENABLED
            | sys::bindings::PERF_FORMAT_TOTAL_TIME_RUNNING) as u64;

        let fd = unsafe {
            sys::perf_event_open(
                &mut attr,
                0,  // pid (calling thread)
                -1, // cpu (any)
                -1, // group_fd
                sys::bindings::PERF_FLAG_FD_CLOEXEC as libc::c_ulong,
            )
        };

        if fd < 0 {
            return Err(PerfEventError::OpenError {
                name: event.name,
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            name: event.name,
            fd,
            prev: Sample::default(),
            data: Sample::default(),
        })
    }

    fn ioctl(&self, op: Toggle) -> Result<(), PerfEventError> {
        let ret = unsafe {
            match op {
                Toggle::Reset => sys::ioctls::RESET(self.fd, 0),
                Toggle::Enable => sys::ioctls::ENABLE(self.fd, 0),
                Toggle::Disable => sys::ioctls::DISABLE(self.fd, 0),
            }
        };
        if ret < 0 {
            return Err(PerfEventError::IoctlError {
                op: op.as_str(),
                name: self.name,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn read(&self) -> Result<Sample, PerfEventError> {
        let mut buf = [0u8; Sample::SIZE];
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(PerfEventError::ReadError {
                name: self.name,
                source: io::Error::last_os_error(),
            });
        }
        Sample::from_bytes(&buf[..n as usize]).ok_or(PerfEventError::ShortRead {
            name: self.name,
            len: n as usize,
        })
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Hardware counters of the thread that created the session.
///
/// Counting happens in windows: [`PerfEvent::start_counters`] opens one and
/// [`PerfEvent::stop_counters`] closes it; [`PerfEvent::counters_map`]
/// reports the closed window. The file descriptors keep referring to the
/// creating thread, so the window may be toggled from any other thread.
pub struct PerfEvent {
    counters: Vec<Counter>,
    started: Instant,
    stopped: Instant,
}

impl PerfEvent {
    /// Opens the [`default_events`] for the calling thread
    pub fn new() -> Result<Self, PerfEventError> {
        Self::with_events(&default_events())
    }

    pub fn with_events(events: &[EventSpec]) -> Result<Self, PerfEventError> {
        // Already opened counters are closed by drop if a later one fails
        let counters = events
            .iter()
            .map(Counter::open)
            .collect::<Result<Vec<_>, _>>()?;

        let now = Instant::now();
        Ok(Self {
            counters,
            started: now,
            stopped: now,
        })
    }

    pub fn start_counters(&mut self) -> Result<(), PerfEventError> {
        for counter in &mut self.counters {
            counter.ioctl(Toggle::Reset)?;
            counter.ioctl(Toggle::Enable)?;
            counter.prev = counter.read()?;
        }
        self.started = Instant::now();
        Ok(())
    }

    pub fn stop_counters(&mut self) -> Result<(), PerfEventError> {
        self.stopped = Instant::now();
        for counter in &mut self.counters {
            counter.data = counter.read()?;
            counter.ioctl(Toggle::Disable)?;
        }
        Ok(())
    }

    pub fn counters_map(&self) -> HashMap<String, f64> {
        let deltas: Vec<(&str, f64)> = self
            .counters
            .iter()
            .map(|counter| (counter.name, counter.data.scaled_delta(&counter.prev)))
            .collect();
        let wall_ns = self.stopped.saturating_duration_since(self.started).as_nanos() as f64;
        counters_map(&deltas, wall_ns)
    }
}
