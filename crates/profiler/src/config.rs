use std::path::PathBuf;
use std::time::Duration;

/// Size of one buffer-manager page in bytes
pub const PAGE_SIZE: u64 = 4096;

pub const DEFAULT_CSV_FILE: &str = "stats.csv";

/// Reporting cadence
pub const TICK: Duration = Duration::from_secs(1);

/// Static labels of the run, echoed into every CSV row in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLabels {
    labels: Vec<(String, String)>,
}

impl RunLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.labels.push((name.into(), value.to_string()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Settings of one reporting loop.
///
/// The active visibility level is not part of the configuration: it belongs
/// to the `CounterRegistry` so producers and the loop filter identically.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Append rows to `csv_path`
    pub csv: bool,
    pub csv_path: PathBuf,
    /// Bytes per page when converting page counts to volumes
    pub page_size: u64,
    pub tick: Duration,
    pub labels: RunLabels,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            csv: true,
            csv_path: PathBuf::from(DEFAULT_CSV_FILE),
            page_size: PAGE_SIZE,
            tick: TICK,
            labels: RunLabels::new(),
        }
    }
}
