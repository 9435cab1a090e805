use tm_matrix::{TileGrid, TileRange};

use crate::error::Result;
use crate::operands::{SegmentNames, SharedOperands};

/// One worker's assignment: a tile range over the shared operands.
#[derive(Debug, Clone, Copy)]
pub struct WorkerJob<'a> {
    pub index: usize,
    pub grid: TileGrid,
    pub range: TileRange,
    pub operands: &'a SharedOperands,
}

impl WorkerJob<'_> {
    /// Compute this job's tiles in the current process through the mappings
    /// it already has.
    ///
    /// # Safety
    /// Same contract as [`SharedOperands::run_range`]: nothing else in this
    /// address space may hold a reference into C while it runs.
    pub unsafe fn run_in_place(&self) -> Result<()> {
        self.operands.run_range(&self.grid, self.range)
    }

    /// Everything a separate process needs to run this job by attaching.
    pub fn args(&self) -> WorkerArgs {
        WorkerArgs {
            index: self.index,
            segments: self.operands.names().clone(),
            n: self.grid.n(),
            tile_size: self.grid.tile_size(),
            range: self.range,
        }
    }
}

/// A worker assignment in a form that can cross a process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub index: usize,
    pub segments: SegmentNames,
    pub n: usize,
    pub tile_size: usize,
    pub range: TileRange,
}

impl WorkerArgs {
    /// Command-line flags understood by the `worker` entry point.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--index".to_string(),
            self.index.to_string(),
            "--a".to_string(),
            self.segments.a.to_string(),
            "--b".to_string(),
            self.segments.b.to_string(),
            "--c".to_string(),
            self.segments.c.to_string(),
            "--n".to_string(),
            self.n.to_string(),
            "--tile-size".to_string(),
            self.tile_size.to_string(),
            "--start".to_string(),
            self.range.start.to_string(),
            "--end".to_string(),
            self.range.end.to_string(),
        ]
    }
}

/// Worker entry point for a separately started process.
///
/// Attaches to the three segments without taking ownership, computes the
/// assigned tiles into C and detaches. The segments stay alive for the
/// coordinating process, which owns them.
pub fn run_attached(args: &WorkerArgs) -> Result<()> {
    let grid = TileGrid::new(args.n, args.tile_size)?;
    let operands = SharedOperands::attach(&args.segments, args.n)?;
    // SAFETY: this process holds no other view of C.
    unsafe { operands.run_range(&grid, args.range) }
}
