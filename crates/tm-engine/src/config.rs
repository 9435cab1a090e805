use crate::error::{EngineError, Result};

/// Tile edge used when nothing better is known about the cache.
pub const DEFAULT_TILE_SIZE: usize = 64;

/// What the engine does when a worker fails to spawn or exits abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report the failed workers as `EngineError::IncompleteResult` and
    /// leave the caller's matrix untouched.
    #[default]
    Error,
    /// After the barrier, zero each failed worker's tiles and recompute them
    /// in the coordinating process.
    Recompute,
}

/// Parameters for a parallel multiply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Tile edge length (from the hardware collaborator).
    pub tile_size: usize,
    /// Number of worker processes.
    pub workers: usize,
    pub failure_policy: FailurePolicy,
}

impl EngineConfig {
    pub fn new(tile_size: usize, workers: usize) -> Self {
        EngineConfig {
            tile_size,
            workers,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Check that tile size and worker count are both at least one.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(EngineError::Config("tile_size must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    /// Default tile size and one worker per available core.
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        EngineConfig::new(DEFAULT_TILE_SIZE, workers)
    }
}
