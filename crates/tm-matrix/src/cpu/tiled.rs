//! Block-tiled matmul kernel over flat row-major buffers.
//!
//! Every output tile is finished by a single call: the whole reduction over
//! `k` happens here, swept in `tile_size` steps for cache locality. Callers
//! that split a grid across workers therefore never share an output cell.

use crate::error::{MatrixError, Result};
use crate::partition::TileRange;
use crate::tile::{Tile, TileGrid};

/// Accumulate `C += A @ B` for every tile in `range`.
///
/// `a`, `b` and `c` are flat `n x n` buffers. The cells of `c` covered by
/// `range` must be zero on entry, otherwise their old value is added to.
///
/// Summation order per element: k-blocks in ascending order, each adding a
/// fresh partial sum (k ascending within the block) into `c`.
pub fn multiply_tile_range(
    a: &[f64],
    b: &[f64],
    c: &mut [f64],
    grid: &TileGrid,
    range: TileRange,
) -> Result<()> {
    check_buffers(a, b, c, grid)?;
    check_range(grid, range)?;

    for linear in range.iter() {
        multiply_tile(a, b, c, grid, grid.tile(linear));
    }
    Ok(())
}

/// Zero every output cell belonging to `range`.
pub fn clear_tile_range(c: &mut [f64], grid: &TileGrid, range: TileRange) -> Result<()> {
    let len = grid.n() * grid.n();
    if c.len() != len {
        return Err(MatrixError::LengthMismatch {
            expected: len,
            got: c.len(),
        });
    }
    check_range(grid, range)?;

    for linear in range.iter() {
        let bounds = grid.bounds(grid.tile(linear));
        for i in bounds.rows.clone() {
            c[i * grid.n() + bounds.cols.start..i * grid.n() + bounds.cols.end].fill(0.0);
        }
    }
    Ok(())
}

fn multiply_tile(a: &[f64], b: &[f64], c: &mut [f64], grid: &TileGrid, tile: Tile) {
    let n = grid.n();
    let bs = grid.tile_size();
    let bounds = grid.bounds(tile);

    for k_start in (0..n).step_by(bs) {
        let k_end = (k_start + bs).min(n);
        for i in bounds.rows.clone() {
            let a_row = &a[i * n..(i + 1) * n];
            for j in bounds.cols.clone() {
                let mut sum = 0.0;
                for k in k_start..k_end {
                    sum += a_row[k] * b[k * n + j];
                }
                c[i * n + j] += sum;
            }
        }
    }
}

fn check_buffers(a: &[f64], b: &[f64], c: &[f64], grid: &TileGrid) -> Result<()> {
    let len = grid.n() * grid.n();
    for buf in [a, b, c] {
        if buf.len() != len {
            return Err(MatrixError::LengthMismatch {
                expected: len,
                got: buf.len(),
            });
        }
    }
    Ok(())
}

fn check_range(grid: &TileGrid, range: TileRange) -> Result<()> {
    if range.start > range.end || range.end > grid.total_tiles() {
        return Err(MatrixError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            total: grid.total_tiles(),
        });
    }
    Ok(())
}
