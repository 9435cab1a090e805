use std::fmt::Debug;

use crate::error::Result;
use crate::matrix::Matrix;

/// Trait for pluggable square-matrix multipliers (sequential, multi-process).
///
/// Both operands are private matrices of equal size; the result is written
/// into `c`, which must already have that size. Implementations overwrite
/// `c` entirely.
pub trait Multiplier: Debug {
    /// Returns the name of this multiplier (e.g. "tiled", "parallel").
    fn name(&self) -> &str;

    /// Compute `c = a @ b`.
    fn multiply_into(&self, a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()>;

    /// Compute `a @ b` into a freshly allocated matrix.
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let mut c = Matrix::zeros(a.n());
        self.multiply_into(a, b, &mut c)?;
        Ok(c)
    }
}
