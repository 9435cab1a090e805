use std::fmt;
use std::time::{Duration, Instant};

use tm_matrix::{partition, Matrix, MatrixError, Multiplier, TileGrid, TileRange};

use crate::config::{EngineConfig, FailurePolicy};
use crate::error::{EngineError, Result};
use crate::launcher::{self, WorkerExit, WorkerHandle, WorkerLauncher};
use crate::operands::{SegmentNames, SharedOperands};
use crate::worker::WorkerJob;

/// How one worker's part of a multiply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The process could not be created.
    SpawnFailed(String),
    /// The process terminated; see how.
    Exited(WorkerExit),
    /// Waiting on the process failed, so its termination is unconfirmed.
    WaitFailed(String),
}

/// Per-worker entry of a run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub index: usize,
    pub range: TileRange,
    pub pid: Option<u32>,
    pub status: WorkerStatus,
}

impl WorkerOutcome {
    /// True if the worker is known to have computed all of its tiles.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, WorkerStatus::Exited(WorkerExit::Success))
    }

    /// True if the worker is known not to be running any more.
    pub fn terminated(&self) -> bool {
        !matches!(self.status, WorkerStatus::WaitFailed(_))
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} (tiles {}): ", self.index, self.range)?;
        match &self.status {
            WorkerStatus::SpawnFailed(err) => write!(f, "failed to start: {err}"),
            WorkerStatus::Exited(exit) => write!(f, "{exit}"),
            WorkerStatus::WaitFailed(err) => write!(f, "wait failed: {err}"),
        }
    }
}

/// Report of a completed parallel multiply.
#[derive(Debug, Clone)]
pub struct ParallelRun {
    /// Wall-clock time from setup to repatriation, inclusive.
    pub elapsed: Duration,
    pub grid: TileGrid,
    /// One entry per worker, ordered by worker index.
    pub workers: Vec<WorkerOutcome>,
    /// Ranges recomputed in the coordinating process after a worker failed.
    pub recovered: Vec<TileRange>,
    /// Segments used by the run; all released by the time this is returned.
    pub segments: Option<SegmentNames>,
}

/// Multi-process tiled multiplier.
///
/// Each call to [`multiply_parallel`](Self::multiply_parallel) moves through
/// setup, partition, dispatch, barrier and repatriation, in that order, with
/// no way to pause or cancel in between. Shared segments and workers never
/// outlive the call.
///
/// The barrier has no timeout: a worker that never terminates blocks the
/// call forever.
#[derive(Debug)]
pub struct ParallelEngine {
    config: EngineConfig,
    launcher: Box<dyn WorkerLauncher>,
}

impl ParallelEngine {
    /// Engine using the platform's default launcher.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_launcher(config, launcher::default_launcher())
    }

    pub fn with_launcher(config: EngineConfig, launcher: Box<dyn WorkerLauncher>) -> Result<Self> {
        config.validate()?;
        Ok(ParallelEngine { config, launcher })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn launcher(&self) -> &dyn WorkerLauncher {
        self.launcher.as_ref()
    }

    /// Compute `c = a @ b` with one worker process per tile range.
    ///
    /// On success `c` holds the full product. If any worker failed to start
    /// or terminated abnormally, the outcome depends on the configured
    /// [`FailurePolicy`]; with `Error`, `c` is left unmodified. A worker whose
    /// termination could not be confirmed always yields
    /// [`EngineError::IncompleteResult`].
    pub fn multiply_parallel(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<ParallelRun> {
        let started = Instant::now();
        a.check_same_size(b)?;
        a.check_same_size(c)?;

        let n = a.n();
        let grid = TileGrid::new(n, self.config.tile_size)?;
        let ranges = partition(grid.total_tiles(), self.config.workers)?;

        if n == 0 {
            return Ok(ParallelRun {
                elapsed: started.elapsed(),
                grid,
                workers: Vec::new(),
                recovered: Vec::new(),
                segments: None,
            });
        }

        // Setup: nothing is dispatched unless all three segments exist.
        let mut operands = SharedOperands::create(n)?;
        operands.load(a, b)?;
        tracing::debug!(
            %grid,
            workers = self.config.workers,
            launcher = self.launcher.name(),
            "shared operands ready"
        );

        let mut outcomes = self.dispatch_and_wait(&operands, grid, &ranges);
        outcomes.sort_by_key(|o| o.index);

        let failures: Vec<WorkerOutcome> =
            outcomes.iter().filter(|o| !o.succeeded()).cloned().collect();
        let mut recovered = Vec::new();
        if !failures.is_empty() {
            for failure in &failures {
                tracing::warn!(%failure, "worker did not complete its tiles");
            }
            // A worker that may still be running could write over a recomputed range.
            let unconfirmed = failures.iter().any(|f| !f.terminated());
            match self.config.failure_policy {
                FailurePolicy::Recompute if !unconfirmed => {
                    for failure in &failures {
                        operands.recompute_range(&grid, failure.range)?;
                        recovered.push(failure.range);
                    }
                    tracing::info!(ranges = recovered.len(), "recomputed failed ranges in-process");
                }
                _ => {
                    operands.release();
                    return Err(EngineError::IncompleteResult {
                        failures,
                        total: ranges.len(),
                    });
                }
            }
        }

        // Repatriate, then tear down: every worker has exited by now.
        c.copy_from_flat(operands.result()?)?;
        let segments = operands.names().clone();
        operands.release();

        let elapsed = started.elapsed();
        tracing::debug!(?elapsed, "parallel multiply finished");
        Ok(ParallelRun {
            elapsed,
            grid,
            workers: outcomes,
            recovered,
            segments: Some(segments),
        })
    }

    /// Start one worker per range, then wait for all that started.
    fn dispatch_and_wait(
        &self,
        operands: &SharedOperands,
        grid: TileGrid,
        ranges: &[TileRange],
    ) -> Vec<WorkerOutcome> {
        let mut outcomes = Vec::with_capacity(ranges.len());
        let mut running: Vec<(usize, TileRange, Box<dyn WorkerHandle>)> = Vec::new();

        for (index, &range) in ranges.iter().enumerate() {
            let job = WorkerJob {
                index,
                grid,
                range,
                operands,
            };
            match self.launcher.launch(&job) {
                Ok(handle) => {
                    tracing::trace!(index, %range, pid = handle.id(), "worker started");
                    running.push((index, range, handle));
                }
                Err(err) => {
                    tracing::warn!(index, %range, error = %err, "failed to start worker");
                    outcomes.push(WorkerOutcome {
                        index,
                        range,
                        pid: None,
                        status: WorkerStatus::SpawnFailed(err.to_string()),
                    });
                }
            }
        }

        // Barrier: every started worker is reaped before the result is read.
        for (index, range, handle) in running {
            let pid = handle.id();
            let status = match handle.wait() {
                Ok(exit) => WorkerStatus::Exited(exit),
                Err(err) => WorkerStatus::WaitFailed(err.to_string()),
            };
            outcomes.push(WorkerOutcome {
                index,
                range,
                pid: Some(pid),
                status,
            });
        }
        outcomes
    }
}

impl Multiplier for ParallelEngine {
    fn name(&self) -> &str {
        "parallel"
    }

    fn multiply_into(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> tm_matrix::Result<()> {
        match self.multiply_parallel(a, b, c) {
            Ok(_) => Ok(()),
            Err(EngineError::Matrix(err)) => Err(err),
            Err(err) => Err(MatrixError::Other(err.to_string())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io;

    use tm_matrix::TiledMultiplier;

    use super::*;

    /// Runs each job synchronously inside `launch`.
    #[derive(Debug, Default)]
    struct InlineLauncher {
        fail_spawn: Vec<usize>,
        crash: Vec<usize>,
        lost: Vec<usize>,
    }

    struct Done(WorkerExit);

    impl WorkerHandle for Done {
        fn id(&self) -> u32 {
            0
        }

        fn wait(self: Box<Self>) -> io::Result<WorkerExit> {
            Ok(self.0)
        }
    }

    /// A worker whose wait reports an error.
    struct Lost;

    impl WorkerHandle for Lost {
        fn id(&self) -> u32 {
            0
        }

        fn wait(self: Box<Self>) -> io::Result<WorkerExit> {
            Err(io::Error::from_raw_os_error(libc::ECHILD))
        }
    }

    impl WorkerLauncher for InlineLauncher {
        fn name(&self) -> &str {
            "inline"
        }

        fn launch(&self, job: &WorkerJob<'_>) -> io::Result<Box<dyn WorkerHandle>> {
            if self.fail_spawn.contains(&job.index) {
                return Err(io::Error::other("no process slots"));
            }
            // SAFETY: single-threaded test, no other view of C is live.
            unsafe { job.run_in_place() }.map_err(|e| io::Error::other(e.to_string()))?;
            if self.crash.contains(&job.index) {
                // Leave junk behind: a second pass doubles the tiles.
                unsafe { job.run_in_place() }.map_err(|e| io::Error::other(e.to_string()))?;
                return Ok(Box::new(Done(WorkerExit::Signaled(11))));
            }
            if self.lost.contains(&job.index) {
                return Ok(Box::new(Lost));
            }
            Ok(Box::new(Done(WorkerExit::Success)))
        }
    }

    fn engine(tile: usize, workers: usize, launcher: InlineLauncher) -> ParallelEngine {
        ParallelEngine::with_launcher(EngineConfig::new(tile, workers), Box::new(launcher)).unwrap()
    }

    fn reference(a: &Matrix, b: &Matrix, tile: usize) -> Matrix {
        TiledMultiplier::new(tile).unwrap().multiply(a, b).unwrap()
    }

    #[test]
    fn test_inline_matches_sequential() {
        let a = Matrix::random(30, 1);
        let b = Matrix::random(30, 2);
        let mut c = Matrix::zeros(30);
        let run = engine(8, 3, InlineLauncher::default())
            .multiply_parallel(&a, &b, &mut c)
            .unwrap();
        assert_eq!(c, reference(&a, &b, 8));
        assert_eq!(run.workers.len(), 3);
        assert!(run.workers.iter().all(WorkerOutcome::succeeded));
        assert!(run.recovered.is_empty());
    }

    #[test]
    fn test_dispatched_ranges_are_disjoint() {
        let launcher = InlineLauncher::default();
        let eng = engine(16, 6, launcher);
        let a = Matrix::random(50, 3);
        let b = Matrix::random(50, 4);
        let mut c = Matrix::zeros(50);
        let run = eng.multiply_parallel(&a, &b, &mut c).unwrap();

        let mut writer = vec![None; 50 * 50];
        for outcome in &run.workers {
            for t in outcome.range.iter() {
                for cell in run.grid.tile_cells(run.grid.tile(t)) {
                    assert_eq!(writer[cell], None, "cell {cell} assigned twice");
                    writer[cell] = Some(outcome.index);
                }
            }
        }
        assert!(writer.iter().all(Option::is_some));
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let launcher = InlineLauncher {
            fail_spawn: vec![1],
            ..Default::default()
        };
        let a = Matrix::random(20, 5);
        let b = Matrix::random(20, 6);
        let mut c = Matrix::from_fn(20, |_, _| -1.0);
        let err = engine(4, 4, launcher).multiply_parallel(&a, &b, &mut c).unwrap_err();

        match err {
            EngineError::IncompleteResult { failures, total } => {
                assert_eq!(total, 4);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
                assert!(matches!(failures[0].status, WorkerStatus::SpawnFailed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Caller's matrix untouched.
        assert!(c.as_slice().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_spawn_failure_does_not_stop_dispatch() {
        let launcher = InlineLauncher {
            fail_spawn: vec![0],
            ..Default::default()
        };
        let eng = engine(4, 3, launcher);
        let a = Matrix::random(12, 1);
        let mut c = Matrix::zeros(12);
        assert!(eng.multiply_parallel(&a, &a, &mut c).is_err());
    }

    #[test]
    fn test_recompute_after_spawn_failure() {
        let launcher = InlineLauncher {
            fail_spawn: vec![0, 2],
            ..Default::default()
        };
        let config = EngineConfig::new(4, 3).with_failure_policy(FailurePolicy::Recompute);
        let eng = ParallelEngine::with_launcher(config, Box::new(launcher)).unwrap();
        let a = Matrix::random(18, 9);
        let b = Matrix::random(18, 10);
        let mut c = Matrix::zeros(18);
        let run = eng.multiply_parallel(&a, &b, &mut c).unwrap();

        assert_eq!(c, reference(&a, &b, 4));
        assert_eq!(run.recovered, vec![run.workers[0].range, run.workers[2].range]);
        assert!(!run.workers[0].succeeded());
        assert!(run.workers[1].succeeded());
    }

    #[test]
    fn test_crash_with_partial_writes_is_recomputed() {
        let launcher = InlineLauncher {
            crash: vec![1],
            ..Default::default()
        };
        let config = EngineConfig::new(5, 2).with_failure_policy(FailurePolicy::Recompute);
        let eng = ParallelEngine::with_launcher(config, Box::new(launcher)).unwrap();
        let a = Matrix::random(21, 11);
        let b = Matrix::random(21, 12);
        let mut c = Matrix::zeros(21);
        let run = eng.multiply_parallel(&a, &b, &mut c).unwrap();

        assert_eq!(c, reference(&a, &b, 5));
        assert_eq!(
            run.workers[1].status,
            WorkerStatus::Exited(WorkerExit::Signaled(11))
        );
        assert_eq!(run.recovered.len(), 1);
    }

    #[test]
    fn test_crash_is_reported_under_error_policy() {
        let launcher = InlineLauncher {
            crash: vec![0],
            ..Default::default()
        };
        let a = Matrix::random(8, 1);
        let mut c = Matrix::zeros(8);
        let err = engine(4, 2, launcher).multiply_parallel(&a, &a, &mut c).unwrap_err();
        assert!(matches!(err, EngineError::IncompleteResult { ref failures, .. } if failures.len() == 1));
        assert_eq!(err.to_string(), "1 of 2 workers did not complete; result is incomplete");
    }

    #[test]
    fn test_unconfirmed_worker_is_never_recomputed() {
        let launcher = InlineLauncher {
            lost: vec![0, 1],
            ..Default::default()
        };
        let config = EngineConfig::new(3, 2).with_failure_policy(FailurePolicy::Recompute);
        let eng = ParallelEngine::with_launcher(config, Box::new(launcher)).unwrap();
        let a = Matrix::random(9, 2);
        let mut c = Matrix::from_fn(9, |_, _| -1.0);
        let err = eng.multiply_parallel(&a, &a, &mut c).unwrap_err();

        match err {
            EngineError::IncompleteResult { failures, total } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|f| !f.terminated()));
                assert!(matches!(failures[0].status, WorkerStatus::WaitFailed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(c.as_slice().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_recompute_refused_when_any_worker_is_unconfirmed() {
        let launcher = InlineLauncher {
            fail_spawn: vec![0],
            lost: vec![2],
            ..Default::default()
        };
        let config = EngineConfig::new(4, 3).with_failure_policy(FailurePolicy::Recompute);
        let eng = ParallelEngine::with_launcher(config, Box::new(launcher)).unwrap();
        let a = Matrix::random(12, 7);
        let mut c = Matrix::zeros(12);
        let err = eng.multiply_parallel(&a, &a, &mut c).unwrap_err();
        assert_eq!(err.to_string(), "2 of 3 workers did not complete; result is incomplete");
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ParallelEngine>();
    }

    #[test]
    fn test_segments_released_after_run() {
        let a = Matrix::random(6, 1);
        let mut c = Matrix::zeros(6);
        let run = engine(2, 2, InlineLauncher::default())
            .multiply_parallel(&a, &a, &mut c)
            .unwrap();
        let names = run.segments.unwrap();
        assert!(SharedOperands::attach(&names, 6).is_err());
    }

    #[test]
    fn test_size_mismatch_aborts_before_dispatch() {
        let launcher = InlineLauncher::default();
        let eng = engine(2, 2, launcher);
        let mut c = Matrix::zeros(4);
        let err = eng
            .multiply_parallel(&Matrix::zeros(4), &Matrix::zeros(5), &mut c)
            .unwrap_err();
        assert!(matches!(err, EngineError::Matrix(MatrixError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_empty_matrix() {
        let mut c = Matrix::zeros(0);
        let run = engine(4, 2, InlineLauncher::default())
            .multiply_parallel(&Matrix::zeros(0), &Matrix::zeros(0), &mut c)
            .unwrap();
        assert!(run.workers.is_empty());
        assert!(run.segments.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ParallelEngine::with_launcher(
            EngineConfig::new(0, 2),
            Box::new(InlineLauncher::default()),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_outcome_display() {
        let outcome = WorkerOutcome {
            index: 2,
            range: TileRange::new(4, 6),
            pid: Some(1234),
            status: WorkerStatus::Exited(WorkerExit::Failed(101)),
        };
        assert_eq!(outcome.to_string(), "worker 2 (tiles [4, 6)): exited with status 101");
    }

    mod fork {
        use super::*;
        use crate::launcher::ForkLauncher;

        fn forked(tile: usize, workers: usize) -> ParallelEngine {
            ParallelEngine::with_launcher(EngineConfig::new(tile, workers), Box::new(ForkLauncher::new()))
                .unwrap()
        }

        fn bits(m: &Matrix) -> Vec<u64> {
            m.as_slice().iter().map(|v| v.to_bits()).collect()
        }

        #[test]
        fn test_single_worker_is_bit_identical_to_sequential() {
            let a = Matrix::from_fn(40, |i, j| (i as f64 * 0.37).sin() + j as f64 / 7.0);
            let b = Matrix::from_fn(40, |i, j| (j as f64 * 1.3).cos() - i as f64 / 11.0);
            let mut c = Matrix::zeros(40);
            forked(16, 1).multiply_parallel(&a, &b, &mut c).unwrap();
            assert_eq!(bits(&c), bits(&reference(&a, &b, 16)));
        }

        #[test]
        fn test_many_workers_are_bit_identical_to_sequential() {
            let a = Matrix::from_fn(45, |i, j| 1.0 / (1.0 + i as f64 + 2.0 * j as f64));
            let b = Matrix::from_fn(45, |i, j| (i * j) as f64 / 13.0 - 0.5);
            let mut c = Matrix::zeros(45);
            let run = forked(8, 4).multiply_parallel(&a, &b, &mut c).unwrap();
            assert_eq!(bits(&c), bits(&reference(&a, &b, 8)));
            assert!(run.workers.iter().all(|w| w.succeeded() && w.pid.is_some()));
        }

        #[test]
        fn test_closed_form_64_by_16_with_4_workers() {
            let n = 64;
            let a = Matrix::from_fn(n, |i, _| i as f64);
            let b = Matrix::from_fn(n, |_, j| j as f64);
            let mut c = Matrix::zeros(n);
            forked(16, 4).multiply_parallel(&a, &b, &mut c).unwrap();
            for &(i, j) in &[(0, 0), (0, 63), (63, 0), (63, 63), (1, 1), (17, 42), (32, 31)] {
                assert_eq!(c.get(i, j), (i * j * n) as f64, "C[{i}][{j}]");
            }
        }

        #[test]
        fn test_partial_trailing_tiles() {
            let n = 50;
            let a = Matrix::from_fn(n, |i, _| i as f64);
            let b = Matrix::from_fn(n, |_, j| j as f64);
            let mut c = Matrix::zeros(n);
            forked(16, 3).multiply_parallel(&a, &b, &mut c).unwrap();
            for i in 0..n {
                for j in 0..n {
                    assert_eq!(c.get(i, j), (i * j * n) as f64);
                }
            }
        }

        #[test]
        fn test_more_workers_than_tiles() {
            let a = Matrix::random(20, 21);
            let b = Matrix::random(20, 22);
            let mut c = Matrix::zeros(20);
            // 4 tiles over 7 workers leaves three ranges empty.
            let run = forked(16, 7).multiply_parallel(&a, &b, &mut c).unwrap();
            assert_eq!(c, reference(&a, &b, 16));
            assert_eq!(run.workers.iter().filter(|w| w.range.is_empty()).count(), 3);
            assert!(run.workers.iter().all(WorkerOutcome::succeeded));
        }

        #[test]
        fn test_engine_as_multiplier() {
            let a = Matrix::random(17, 1);
            let b = Matrix::random(17, 2);
            let eng: Box<dyn Multiplier> = Box::new(forked(4, 2));
            assert_eq!(eng.name(), "parallel");
            assert_eq!(eng.multiply(&a, &b).unwrap(), reference(&a, &b, 4));
        }
    }
}
