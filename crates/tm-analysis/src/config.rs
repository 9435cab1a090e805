//! Defaults shared by the analysis layer and the command line.

/// Matrix edge used when none is given.
pub const DEFAULT_MATRIX_SIZE: usize = 500;

/// Smallest tile edge the tile-size heuristic returns.
pub const MIN_TILE_SIZE: usize = 32;

/// Largest tile edge the tile-size heuristic returns.
pub const MAX_TILE_SIZE: usize = 256;

/// Parallel fraction assumed until one is measured from a two-worker run.
pub const THEORETICAL_F: f64 = 0.98;

pub const GIGA: f64 = 1e9;
