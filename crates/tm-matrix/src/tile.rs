use std::fmt;

use crate::error::{MatrixError, Result};

/// The grid of square tiles covering an `n x n` matrix.
///
/// Tiles are `tile_size` on a side; the last tile in each dimension is
/// clipped to `n`. Tiles are numbered row-major:
/// `linear = row_block * tiles_per_dim + col_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGrid {
    n: usize,
    tile_size: usize,
    tiles_per_dim: usize,
}

/// Grid coordinates of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub row_block: usize,
    pub col_block: usize,
}

/// Element bounds of a tile, half-open and already clipped to `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBounds {
    pub rows: std::ops::Range<usize>,
    pub cols: std::ops::Range<usize>,
}

impl TileGrid {
    /// Create the tile grid for an `n x n` matrix.
    ///
    /// # Errors
    /// Returns an error if `tile_size` is zero.
    pub fn new(n: usize, tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(MatrixError::InvalidTileSize(tile_size));
        }
        Ok(TileGrid {
            n,
            tile_size,
            tiles_per_dim: n.div_ceil(tile_size),
        })
    }

    /// Matrix edge length.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Number of tiles along one dimension (`ceil(n / tile_size)`).
    pub fn tiles_per_dim(&self) -> usize {
        self.tiles_per_dim
    }

    /// Total number of tiles (`tiles_per_dim^2`).
    pub fn total_tiles(&self) -> usize {
        self.tiles_per_dim * self.tiles_per_dim
    }

    /// Decode a linear tile index into grid coordinates.
    ///
    /// # Panics
    /// Panics if `linear >= total_tiles()`.
    pub fn tile(&self, linear: usize) -> Tile {
        assert!(
            linear < self.total_tiles(),
            "tile index {} out of range for {} tiles",
            linear,
            self.total_tiles()
        );
        Tile {
            row_block: linear / self.tiles_per_dim,
            col_block: linear % self.tiles_per_dim,
        }
    }

    /// Encode grid coordinates as a linear tile index.
    pub fn linear_index(&self, tile: Tile) -> usize {
        tile.row_block * self.tiles_per_dim + tile.col_block
    }

    /// Element bounds covered by `tile`, clipped to the matrix edge.
    pub fn bounds(&self, tile: Tile) -> TileBounds {
        let row_start = tile.row_block * self.tile_size;
        let col_start = tile.col_block * self.tile_size;
        TileBounds {
            rows: row_start..(row_start + self.tile_size).min(self.n),
            cols: col_start..(col_start + self.tile_size).min(self.n),
        }
    }

    /// Flat row-major indices of every output cell inside `tile`.
    pub fn tile_cells(&self, tile: Tile) -> impl Iterator<Item = usize> + '_ {
        let bounds = self.bounds(tile);
        let n = self.n;
        bounds
            .rows
            .flat_map(move |i| bounds.cols.clone().map(move |j| i * n + j))
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{n}x{n} in {t}x{t} tiles ({d}x{d} grid, {total} total)",
            n = self.n,
            t = self.tile_size,
            d = self.tiles_per_dim,
            total = self.total_tiles()
        )
    }
}
