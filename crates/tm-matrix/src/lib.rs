//! `tm-matrix` - Square matrices and the tiled multiply kernel for tilemul.
//!
//! This crate provides:
//! - A private, process-owned `Matrix` of f64 values
//! - `TileGrid`, the row-major numbering of square tiles over a matrix
//! - `partition`, which splits a tile grid into disjoint per-worker ranges
//! - The tiled kernel that completes whole output tiles per call
//! - A `Multiplier` trait and the sequential `TiledMultiplier`

pub mod cpu;
pub mod error;
pub mod matrix;
pub mod multiplier;
pub mod partition;
pub mod tile;

// Re-export primary types at the crate root for convenience.
pub use cpu::tiled::{clear_tile_range, multiply_tile_range};
pub use cpu::TiledMultiplier;
pub use error::{MatrixError, Result};
pub use matrix::Matrix;
pub use multiplier::Multiplier;
pub use partition::{partition, TileRange};
pub use tile::{Tile, TileBounds, TileGrid};
