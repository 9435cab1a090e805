use tm_matrix::{clear_tile_range, multiply_tile_range, Matrix, TileGrid, TileRange};
use tm_shm::{matrix_bytes, SegmentName, SharedSegment};

use crate::error::Result;

/// Names of the three segments of one multiply, enough for another process
/// to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNames {
    pub a: SegmentName,
    pub b: SegmentName,
    pub c: SegmentName,
}

impl SegmentNames {
    /// Fresh names for a new multiply.
    pub fn unique() -> Result<Self> {
        Ok(SegmentNames {
            a: SegmentName::unique("a")?,
            b: SegmentName::unique("b")?,
            c: SegmentName::unique("c")?,
        })
    }
}

/// Operands A, B and result C of one multiply, each in its own shared segment.
///
/// A and B are written once by [`load`](Self::load) and only read after
/// that. Workers write disjoint tiles of C.
#[derive(Debug)]
pub struct SharedOperands {
    n: usize,
    names: SegmentNames,
    a: SharedSegment,
    b: SharedSegment,
    c: SharedSegment,
}

impl SharedOperands {
    /// Create three owned, zero-filled segments sized for `n x n` matrices.
    ///
    /// If any segment cannot be created, the ones already created are
    /// released before the error is returned.
    pub fn create(n: usize) -> Result<Self> {
        let names = SegmentNames::unique()?;
        let bytes = matrix_bytes(n);
        let a = SharedSegment::create(names.a.clone(), bytes)?;
        let b = SharedSegment::create(names.b.clone(), bytes)?;
        let c = SharedSegment::create(names.c.clone(), bytes)?;
        Ok(SharedOperands { n, names, a, b, c })
    }

    /// Attach to segments created by another process.
    pub fn attach(names: &SegmentNames, n: usize) -> Result<Self> {
        let bytes = matrix_bytes(n);
        let a = SharedSegment::attach(names.a.clone(), bytes)?;
        let b = SharedSegment::attach(names.b.clone(), bytes)?;
        let c = SharedSegment::attach(names.c.clone(), bytes)?;
        Ok(SharedOperands {
            n,
            names: names.clone(),
            a,
            b,
            c,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn names(&self) -> &SegmentNames {
        &self.names
    }

    /// Copy the private operands in and zero the result.
    pub fn load(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        a.copy_to_flat(self.a.as_f64_slice_mut()?)?;
        b.copy_to_flat(self.b.as_f64_slice_mut()?)?;
        self.c.as_f64_slice_mut()?.fill(0.0);
        Ok(())
    }

    /// The shared result buffer.
    pub fn result(&self) -> Result<&[f64]> {
        Ok(self.c.as_f64_slice()?)
    }

    /// Run the kernel over `range` in this process, writing into the shared C.
    ///
    /// # Safety
    /// No other reference into the C segment may be live in this address
    /// space for the duration of the call. Other processes may write C
    /// concurrently only outside `range`.
    pub unsafe fn run_range(&self, grid: &TileGrid, range: TileRange) -> Result<()> {
        let a = self.a.as_f64_slice()?;
        let b = self.b.as_f64_slice()?;
        let c = self.c_mut()?;
        multiply_tile_range(a, b, c, grid, range)?;
        Ok(())
    }

    /// Zero `range` in C and compute it again in this process.
    ///
    /// Used for ranges whose worker died, possibly after writing part of its
    /// tiles. Only valid after every worker has terminated.
    pub fn recompute_range(&mut self, grid: &TileGrid, range: TileRange) -> Result<()> {
        let a = self.a.as_f64_slice()?;
        let b = self.b.as_f64_slice()?;
        let c = self.c.as_f64_slice_mut()?;
        clear_tile_range(c, grid, range)?;
        multiply_tile_range(a, b, c, grid, range)?;
        Ok(())
    }

    /// Unmap all three segments and unlink the ones this handle owns.
    pub fn release(&mut self) {
        self.a.release();
        self.b.release();
        self.c.release();
    }

    unsafe fn c_mut(&self) -> Result<&mut [f64]> {
        let ptr = self.c.as_ptr();
        if ptr.is_null() {
            return Err(tm_shm::ShmError::Unavailable(self.names.c.to_string()).into());
        }
        Ok(std::slice::from_raw_parts_mut(ptr as *mut f64, self.c.f64_len()))
    }
}
