use std::fmt;

use crate::error::{MatrixError, Result};

/// Half-open interval `[start, end)` of linear tile indices owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
    pub start: usize,
    pub end: usize,
}

impl TileRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted tile range [{start}, {end})");
        TileRange { start, end }
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `total_tiles` into `worker_count` contiguous ranges.
///
/// The first `total_tiles % worker_count` workers get one extra tile, so
/// range lengths differ by at most one. When there are fewer tiles than
/// workers the trailing workers receive empty ranges.
pub fn partition(total_tiles: usize, worker_count: usize) -> Result<Vec<TileRange>> {
    if worker_count == 0 {
        return Err(MatrixError::InvalidWorkerCount(worker_count));
    }

    let base = total_tiles / worker_count;
    let extra = total_tiles % worker_count;

    let mut ranges = Vec::with_capacity(worker_count);
    let mut start = 0;
    for worker in 0..worker_count {
        let len = base + usize::from(worker < extra);
        ranges.push(TileRange::new(start, start + len));
        start += len;
    }
    Ok(ranges)
}
