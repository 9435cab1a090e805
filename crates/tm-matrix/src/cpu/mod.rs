pub mod tiled;

use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::multiplier::Multiplier;
use crate::partition::TileRange;
use crate::tile::TileGrid;

/// Single-process tiled multiplier.
///
/// Runs the tiled kernel over the whole tile grid in the calling process.
/// This is the reference that the multi-process engine must reproduce bit
/// for bit.
#[derive(Debug, Clone)]
pub struct TiledMultiplier {
    tile_size: usize,
}

impl TiledMultiplier {
    /// # Errors
    /// Returns an error if `tile_size` is zero.
    pub fn new(tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(MatrixError::InvalidTileSize(tile_size));
        }
        Ok(TiledMultiplier { tile_size })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }
}

impl Multiplier for TiledMultiplier {
    fn name(&self) -> &str {
        "tiled"
    }

    fn multiply_into(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        a.check_same_size(b)?;
        a.check_same_size(c)?;

        let grid = TileGrid::new(a.n(), self.tile_size)?;
        c.clear();
        tiled::multiply_tile_range(
            a.as_slice(),
            b.as_slice(),
            c.as_mut_slice(),
            &grid,
            TileRange::new(0, grid.total_tiles()),
        )
    }
}
