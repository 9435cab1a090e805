use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tm_analysis::{report, BenchmarkReport, HardwareInfo, PerformanceAnalyzer};
use tm_engine::{
    CommandLauncher, EngineConfig, ParallelEngine, ParallelRun, WorkerArgs, WorkerLauncher,
};
use tm_matrix::{Matrix, Multiplier, TileGrid, TiledMultiplier};

use crate::{EngineArgs, LauncherKind, MatrixArgs};

/// Operands and tiling for one command, resolved against the hardware.
struct Setup {
    hardware: HardwareInfo,
    n: usize,
    tile: usize,
    a: Matrix,
    b: Matrix,
}

impl Setup {
    fn new(args: &MatrixArgs) -> Self {
        let hardware = HardwareInfo::detect();
        let tile = args.tile.unwrap_or_else(|| hardware.optimal_tile_size());
        Setup {
            n: args.size,
            tile,
            a: Matrix::random(args.size, args.seed),
            b: Matrix::random(args.size, args.seed.wrapping_add(1)),
            hardware,
        }
    }

    fn grid(&self) -> Result<TileGrid> {
        Ok(TileGrid::new(self.n, self.tile)?)
    }

    fn print_layout(&self) -> Result<()> {
        println!("Matrix: {n}x{n}", n = self.n);
        println!("Tiles:  {}", self.grid()?);
        Ok(())
    }

    /// Run the sequential multiply and return the product and its time in seconds.
    fn run_sequential(&self) -> Result<(Matrix, f64)> {
        let multiplier = TiledMultiplier::new(self.tile)?;
        let started = Instant::now();
        let c = multiplier.multiply(&self.a, &self.b)?;
        Ok((c, started.elapsed().as_secs_f64()))
    }

    fn run_parallel(&self, engine: &EngineArgs, workers: usize) -> Result<(Matrix, ParallelRun)> {
        let config = EngineConfig::new(self.tile, workers).with_failure_policy(engine.policy.into());
        let engine = ParallelEngine::with_launcher(config, launcher(engine.launcher)?)?;
        let mut c = Matrix::zeros(self.n);
        let run = engine
            .multiply_parallel(&self.a, &self.b, &mut c)
            .with_context(|| format!("parallel multiply with {workers} workers failed"))?;
        for range in &run.recovered {
            tracing::warn!(%range, "tiles recomputed after a worker failure");
        }
        Ok((c, run))
    }

    fn workers_or_cores(&self, workers: Option<usize>) -> usize {
        workers.unwrap_or(self.hardware.logical_cores).max(1)
    }
}

fn launcher(kind: LauncherKind) -> Result<Box<dyn WorkerLauncher>> {
    let launcher: Box<dyn WorkerLauncher> = match kind {
        #[cfg(unix)]
        LauncherKind::Fork => Box::new(tm_engine::ForkLauncher::new()),
        #[cfg(not(unix))]
        LauncherKind::Fork => bail!("the fork launcher needs a unix platform"),
        LauncherKind::Command => Box::new(
            CommandLauncher::current_exe().context("cannot locate the tilemul executable")?,
        ),
    };
    Ok(launcher)
}

pub(crate) fn info(json: bool) -> Result<()> {
    let hardware = HardwareInfo::detect();
    if json {
        println!("{}", hardware.to_json()?);
    } else {
        print!("{}", report::header("HARDWARE"));
        println!("{hardware}");
    }
    Ok(())
}

pub(crate) fn show_config(args: &MatrixArgs, workers: Option<usize>) -> Result<()> {
    let setup = Setup::new(args);
    let tile_note = if args.tile.is_some() { "" } else { " (from L1 cache)" };
    print!("{}", report::header("CONFIGURATION"));
    println!("{:<30}{n}x{n}", "Matrix size:", n = setup.n);
    println!("{:<30}{t}x{t}{tile_note}", "Tile size:", t = setup.tile);
    println!("{:<30}{}", "Workers:", setup.workers_or_cores(workers));
    println!("{:<30}{}", "Logical cores:", setup.hardware.logical_cores);
    println!("{:<30}{}", "Physical cores (est.):", setup.hardware.physical_cores);
    Ok(())
}

pub(crate) fn sequential(args: &MatrixArgs) -> Result<()> {
    let setup = Setup::new(args);
    setup.print_layout()?;

    let (_, seconds) = setup.run_sequential()?;
    let mut analyzer = PerformanceAnalyzer::new();
    analyzer.set_sequential_time(seconds);
    let result = analyzer.analyze_result(1, seconds, setup.n);
    println!("{}", report::sequential_table(result));
    Ok(())
}

pub(crate) fn parallel(
    args: &MatrixArgs,
    engine: &EngineArgs,
    workers: Option<usize>,
    verify: bool,
) -> Result<()> {
    let setup = Setup::new(args);
    let workers = setup.workers_or_cores(workers);
    setup.print_layout()?;

    println!("Running sequential reference...");
    let (reference, seq_seconds) = setup.run_sequential()?;

    println!("Running with {workers} worker processes...");
    let (c, run) = setup.run_parallel(engine, workers)?;

    if verify && c != reference {
        bail!("parallel result differs from the sequential result");
    }

    let mut analyzer = PerformanceAnalyzer::new();
    analyzer.set_sequential_time(seq_seconds);
    let sequential_time = analyzer.sequential_time();
    let result = analyzer.analyze_result(workers, run.elapsed.as_secs_f64(), setup.n);
    println!("{}", report::parallel_table(result, sequential_time));
    if verify {
        println!("Result verified against the sequential multiply.");
    }
    Ok(())
}

pub(crate) fn bench(
    args: &MatrixArgs,
    engine: &EngineArgs,
    max_workers: Option<usize>,
    csv: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    let setup = Setup::new(args);
    let counts = tm_analysis::process_counts(setup.workers_or_cores(max_workers));
    let listed: Vec<String> = counts.iter().map(ToString::to_string).collect();
    println!("Worker counts: {}", listed.join(", "));
    setup.print_layout()?;

    let mut analyzer = PerformanceAnalyzer::new();
    for &workers in &counts {
        println!("\n--- {workers} process(es) ---");
        let seconds = if workers == 1 {
            let (_, seconds) = setup.run_sequential()?;
            analyzer.set_sequential_time(seconds);
            seconds
        } else {
            setup.run_parallel(engine, workers)?.1.elapsed.as_secs_f64()
        };
        println!("Time: {seconds:.6} s");
        analyzer.analyze_result(workers, seconds, setup.n);
    }

    println!("\n{}", report::benchmark_table(&analyzer));

    if let Some(path) = csv {
        report::export_csv(&analyzer, path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("Results written to {}", path.display());
    }
    if let Some(path) = json {
        BenchmarkReport::new(&analyzer, setup.n, setup.tile)
            .export_json(path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

pub(crate) fn worker(args: &WorkerArgs) -> Result<()> {
    tm_engine::run_attached(args)
        .with_context(|| format!("worker {} failed on tiles {}", args.index, args.range))
}
