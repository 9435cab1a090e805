//! tilemul - Tiled, multi-process matrix multiplication
//!
//! # Commands
//!
//! - `info` - Show detected hardware and the derived tile size
//! - `config` - Show the settings a run would use
//! - `sequential` - Time the single-process tiled multiply
//! - `parallel` - Time a multi-process multiply against a sequential reference
//! - `bench` - Sweep worker counts and report speedup and Amdahl projections
//! - `worker` - Compute one tile range over existing shared segments (internal)

mod commands;

use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tm_analysis::config::DEFAULT_MATRIX_SIZE;
use tm_engine::{FailurePolicy, WorkerArgs};
use tm_matrix::TileRange;
use tm_shm::SegmentName;
use tracing_subscriber::{fmt, EnvFilter};

/// Multiply square matrices with cache-sized tiles across worker processes.
#[derive(Parser)]
#[command(name = "tilemul")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show detected hardware and the derived tile size
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the matrix size, tile size and worker count a run would use
    Config {
        #[command(flatten)]
        matrix: MatrixArgs,

        /// Worker processes (default: logical cores)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Time the single-process tiled multiply
    Sequential {
        #[command(flatten)]
        matrix: MatrixArgs,
    },
    /// Time a multi-process multiply against a sequential reference
    ///
    /// Examples:
    ///   tilemul parallel --size 1000 --workers 8
    ///   tilemul parallel --launcher command --policy recompute
    Parallel {
        #[command(flatten)]
        matrix: MatrixArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Worker processes (default: logical cores)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Fail unless the result matches the sequential one bit for bit
        #[arg(long)]
        verify: bool,
    },
    /// Sweep 1, 2, 4, ... workers and report speedup and Amdahl projections
    ///
    /// Examples:
    ///   tilemul bench --size 800 --max-workers 8 --csv results.csv
    Bench {
        #[command(flatten)]
        matrix: MatrixArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Largest worker count to try (default: logical cores)
        #[arg(short, long)]
        max_workers: Option<usize>,

        /// Write results as CSV
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Compute one tile range over existing shared segments
    #[command(hide = true)]
    Worker(WorkerCommand),
}

#[derive(Args, Clone, Copy)]
pub(crate) struct MatrixArgs {
    /// Matrix edge N (NxN)
    #[arg(short = 'n', long, default_value_t = DEFAULT_MATRIX_SIZE,
          value_parser = clap::value_parser!(u64).range(10..=10000).map(|v| v as usize))]
    pub size: usize,

    /// Tile edge (default: derived from the L1 cache size)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize))]
    pub tile: Option<usize>,

    /// Seed for the random operands
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Clone, Copy)]
pub(crate) struct EngineArgs {
    /// How workers are started
    #[arg(long, value_enum, default_value_t = LauncherKind::Fork)]
    pub launcher: LauncherKind,

    /// What to do when a worker fails
    #[arg(long, value_enum, default_value_t = PolicyArg::Error)]
    pub policy: PolicyArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LauncherKind {
    /// fork() the current process per worker
    Fork,
    /// Re-run this executable as `tilemul worker`
    Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PolicyArg {
    /// Report failed workers and discard the result
    Error,
    /// Recompute failed workers' tiles in this process
    Recompute,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Error => FailurePolicy::Error,
            PolicyArg::Recompute => FailurePolicy::Recompute,
        }
    }
}

/// Flags produced by `WorkerArgs::to_args`.
#[derive(Args, Clone)]
pub(crate) struct WorkerCommand {
    #[arg(long)]
    index: usize,
    #[arg(long)]
    a: SegmentName,
    #[arg(long)]
    b: SegmentName,
    #[arg(long)]
    c: SegmentName,
    #[arg(long)]
    n: usize,
    #[arg(long)]
    tile_size: usize,
    #[arg(long)]
    start: usize,
    #[arg(long)]
    end: usize,
}

impl WorkerCommand {
    fn into_args(self) -> anyhow::Result<WorkerArgs> {
        anyhow::ensure!(
            self.start <= self.end,
            "tile range start {} is past its end {}",
            self.start,
            self.end
        );
        Ok(WorkerArgs {
            index: self.index,
            segments: tm_engine::SegmentNames {
                a: self.a,
                b: self.b,
                c: self.c,
            },
            n: self.n,
            tile_size: self.tile_size,
            range: TileRange::new(self.start, self.end),
        })
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Info { json } => commands::info(json),
        Commands::Config { matrix, workers } => commands::show_config(&matrix, workers),
        Commands::Sequential { matrix } => commands::sequential(&matrix),
        Commands::Parallel {
            matrix,
            engine,
            workers,
            verify,
        } => commands::parallel(&matrix, &engine, workers, verify),
        Commands::Bench {
            matrix,
            engine,
            max_workers,
            csv,
            json,
        } => commands::bench(&matrix, &engine, max_workers, csv.as_deref(), json.as_deref()),
        Commands::Worker(worker) => commands::worker(&worker.into_args()?),
    }
}
