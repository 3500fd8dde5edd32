use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use counters::{CounterRegistry, Snapshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ProfilerConfig;
use crate::csv::CsvSink;
use crate::error::ProfilerError;
use crate::report;
use crate::supervisor::supervise;
use crate::table::TableSink;
use crate::workload::WorkloadInfo;

/// The periodic reporter.
///
/// Every tick sweeps all counter categories once, prints a table row and,
/// from the second tick on, appends a CSV row. The first tick only warms up
/// the delta counters, so its row is kept out of the CSV.
pub struct Profiler {
    registry: Arc<CounterRegistry>,
    workload: Box<dyn WorkloadInfo>,
    config: ProfilerConfig,
    table: TableSink<Box<dyn Write + Send>>,
    csv: Option<CsvSink>,
    snapshot: Snapshot,
    ticks: u64,
}

impl Profiler {
    /// Creates a profiler printing its table to stdout.
    ///
    /// A CSV file that cannot be opened is reported once and CSV output is
    /// disabled; the table is still produced.
    pub fn new(
        registry: Arc<CounterRegistry>,
        workload: Box<dyn WorkloadInfo>,
        config: ProfilerConfig,
    ) -> Self {
        Self::with_output(registry, workload, config, Box::new(io::stdout()))
    }

    pub fn with_output(
        registry: Arc<CounterRegistry>,
        workload: Box<dyn WorkloadInfo>,
        config: ProfilerConfig,
        out: Box<dyn Write + Send>,
    ) -> Self {
        let csv = if config.csv {
            match CsvSink::open(&config.csv_path) {
                Ok(sink) => Some(sink),
                Err(err) => {
                    log::warn!("{}; CSV output disabled", err);
                    None
                }
            }
        } else {
            None
        };

        Self {
            registry,
            workload,
            config,
            table: TableSink::new(out),
            csv,
            snapshot: Snapshot::new(),
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn csv_enabled(&self) -> bool {
        self.csv.is_some()
    }

    /// Snapshot of the most recent tick
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Runs one sweep and emits its results.
    pub fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        self.snapshot.clear();
        self.registry.aggregate(&mut self.snapshot);

        let level = self.registry.level();
        let table = report::table_row(
            &self.snapshot,
            level,
            self.config.page_size,
            &mut *self.workload,
        );
        self.table.emit(&table.header, &table.row)?;

        if let Err(err) = self.write_csv() {
            log::warn!("{}; CSV output disabled", err);
            self.csv = None;
        }
        Ok(())
    }

    fn write_csv(&mut self) -> Result<(), ProfilerError> {
        let Some(sink) = self.csv.as_mut() else {
            return Ok(());
        };
        let level = self.registry.level();

        if sink.needs_header() {
            let header = report::csv_header(level, &self.config.labels, &*self.workload);
            sink.write_header(&header)?;
        }
        if self.ticks > 1 {
            let row = report::csv_row(
                &self.snapshot,
                level,
                &self.config.labels,
                &mut *self.workload,
            );
            sink.append(&row)?;
        }
        Ok(())
    }

    /// Ticks on absolute deadlines until `token` is cancelled and returns the
    /// number of ticks.
    ///
    /// A tick that overruns its slot is followed immediately by the next one.
    /// Cancellation is only observed between ticks.
    ///
    /// Ticks run inline on the runtime thread. A tick holds each category
    /// lock briefly and writes one line per sink, so it never parks the
    /// thread for long at one tick per period.
    pub async fn run(mut self, token: CancellationToken) -> Result<u64> {
        log::info!("Profiler started, reporting every {:?}", self.config.tick);

        let mut next = Instant::now() + self.config.tick;
        while !token.is_cancelled() {
            self.tick()?;

            let now = Instant::now();
            if now > next {
                log::debug!("Tick {} overran its deadline by {:?}", self.ticks, now - next);
            }

            tokio::select! {
                _ = tokio::time::sleep_until(next) => {}
                _ = token.cancelled() => break,
            }
            next += self.config.tick;
        }

        log::info!("Profiler stopped after {} ticks", self.ticks);
        Ok(self.ticks)
    }

    /// Spawns [`Profiler::run`] as a supervised task.
    ///
    /// If the loop fails, the failure is logged and `token` is cancelled so
    /// the rest of the process can shut down with it.
    pub fn start(self, token: CancellationToken) -> ProfilerHandle {
        let run = self.run(token.clone());
        let join_handle = tokio::spawn(supervise(run, token.clone(), "profiler"));
        ProfilerHandle { token, join_handle }
    }
}

/// Handle to a running profiler task
pub struct ProfilerHandle {
    token: CancellationToken,
    join_handle: JoinHandle<Result<u64>>,
}

impl ProfilerHandle {
    /// Requests a stop and waits for the loop to finish its current tick.
    pub async fn stop(self) -> Result<u64> {
        self.token.cancel();
        self.join().await
    }

    /// Waits for the loop without requesting a stop
    pub async fn join(self) -> Result<u64> {
        match self.join_handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("Profiler task panicked: {:?}", e)),
        }
    }
}
