use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use counters::{BmCounters, CounterRegistry, Level, RdmaCounters};
use profiler::{Profiler, ProfilerConfig, RunLabels, DEFAULT_CSV_FILE};
use tokio_util::sync::CancellationToken;

mod simulation;

use simulation::{spawn_workers, KvWorkloadInfo, SimulatedBufferManager, WorkloadSpec};

/// Synthetic key-value benchmark reporting through the periodic profiler
#[derive(Debug, Parser)]
struct Command {
    /// Verbose debug output
    #[arg(short, long)]
    verbose: bool,

    /// Run duration in seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Number of worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Do not write CSV rows
    #[arg(long = "no-csv", action = ArgAction::SetFalse)]
    csv: bool,

    #[arg(long, default_value = DEFAULT_CSV_FILE)]
    csv_file: PathBuf,

    /// Most detailed counter level shown: release, csv, test or trace
    #[arg(long, default_value = "release")]
    verbosity: Level,

    /// Sample hardware performance counters of the worker threads
    #[arg(long)]
    cpu_counters: bool,

    /// InfiniBand device to report traffic for, e.g. mlx5_0
    #[arg(long)]
    rdma_device: Option<String>,

    #[arg(long, default_value = "0")]
    node_id: u64,

    #[arg(long, default_value = "1")]
    nodes: u64,

    /// Label of this run in the CSV (default: host name)
    #[arg(long)]
    tag: Option<String>,

    /// Pages in the simulated buffer pool
    #[arg(long, default_value = "262144")]
    pool_pages: u64,

    /// Key space of the synthetic workload
    #[arg(long, default_value = "1000000")]
    elements: u64,

    /// Percentage of lookups among all operations
    #[arg(long, default_value = "50")]
    read_ratio: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Command::parse();

    let default_filter = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let tag = match &opts.tag {
        Some(tag) => tag.clone(),
        None => hostname::get()
            .context("failed to read host name")?
            .to_string_lossy()
            .into_owned(),
    };

    let registry = Arc::new(CounterRegistry::new(opts.verbosity));
    let buffer_manager = Arc::new(SimulatedBufferManager::new(opts.pool_pages));
    let _bm_counters = BmCounters::new(&registry, buffer_manager.clone());
    let _rdma_counters = opts
        .rdma_device
        .as_deref()
        .map(|device| RdmaCounters::infiniband(&registry, device));

    let spec = WorkloadSpec {
        elements: opts.elements.max(1),
        read_ratio: opts.read_ratio.min(100),
    };

    let config = ProfilerConfig {
        csv: opts.csv,
        csv_path: opts.csv_file.clone(),
        labels: RunLabels::new()
            .with("Workers", opts.workers)
            .with("Nodes", opts.nodes)
            .with("NodeId", opts.node_id)
            .with("PoolPages", opts.pool_pages)
            .with("Tag", &tag),
        ..ProfilerConfig::default()
    };

    let token = CancellationToken::new();
    let workers = spawn_workers(
        opts.workers,
        &registry,
        &buffer_manager,
        spec,
        opts.cpu_counters,
        &token,
    )?;

    let workload = KvWorkloadInfo::new("kv", spec);
    let profiler = Profiler::new(registry.clone(), Box::new(workload), config).start(token.clone());

    log::info!(
        "Running {} workers on node {} of {} (tag {})",
        opts.workers,
        opts.node_id,
        opts.nodes,
        tag
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            log::info!("Ctrl-C received, shutting down");
        }
        _ = tokio::time::sleep(Duration::from_secs(opts.duration)), if opts.duration > 0 => {
            log::info!("Run finished after {} seconds", opts.duration);
        }
        _ = token.cancelled() => {
            log::warn!("Profiler exited early, shutting down");
        }
    }

    // Stops the workers as well
    let ticks = profiler.stop().await;
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))?;
    }

    log::info!("Reported {} ticks", ticks?);
    Ok(())
}
