use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MatrixError, Result};

/// A square matrix of f64 values owned by the current process.
///
/// Data is held row-major in a single vector. This is the *private*
/// representation: to hand a matrix to another process it must be copied
/// into a flat shared buffer with [`Matrix::copy_to_flat`], and results come
/// back through [`Matrix::copy_from_flat`].
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create an `n x n` matrix filled with zeros.
    pub fn zeros(n: usize) -> Self {
        Matrix {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Create an `n x n` matrix from row-major data.
    pub fn from_vec(n: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != n * n {
            return Err(MatrixError::LengthMismatch {
                expected: n * n,
                got: data.len(),
            });
        }
        Ok(Matrix { n, data })
    }

    /// Create an `n x n` matrix where element `(i, j)` is `f(i, j)`.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Matrix { n, data }
    }

    /// Create an `n x n` matrix of small integers in `0..=9`, drawn from a
    /// seeded RNG so runs are reproducible.
    pub fn random(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..n * n).map(|_| rng.gen_range(0..10) as f64).collect();
        Matrix { n, data }
    }

    /// Edge length of the matrix.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of elements (`n * n`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if `i` or `j` is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of bounds for {0}x{0}", self.n);
        self.data[i * self.n + j]
    }

    /// Set the element at row `i`, column `j`.
    ///
    /// # Panics
    /// Panics if `i` or `j` is out of bounds.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of bounds for {0}x{0}", self.n);
        self.data[i * self.n + j] = value;
    }

    /// Borrow row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Row-major view of the data.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Set every element to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Copy this matrix into a flat row-major buffer of exactly `n * n` values.
    pub fn copy_to_flat(&self, dst: &mut [f64]) -> Result<()> {
        if dst.len() != self.data.len() {
            return Err(MatrixError::LengthMismatch {
                expected: self.data.len(),
                got: dst.len(),
            });
        }
        for i in 0..self.n {
            dst[i * self.n..(i + 1) * self.n].copy_from_slice(self.row(i));
        }
        Ok(())
    }

    /// Overwrite this matrix from a flat row-major buffer of `n * n` values.
    pub fn copy_from_flat(&mut self, src: &[f64]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(MatrixError::LengthMismatch {
                expected: self.data.len(),
                got: src.len(),
            });
        }
        self.data.copy_from_slice(src);
        Ok(())
    }

    /// Errors unless `self` and `other` have the same edge length.
    pub fn check_same_size(&self, other: &Matrix) -> Result<()> {
        if self.n != other.n {
            return Err(MatrixError::DimensionMismatch {
                expected: self.n,
                got: other.n,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let m = Matrix::zeros(3);
        assert_eq!(m.n(), 3);
        assert_eq!(m.len(), 9);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert_eq!(
            Matrix::from_vec(2, vec![1.0; 3]),
            Err(MatrixError::LengthMismatch { expected: 4, got: 3 })
        );
    }

    #[test]
    fn test_from_fn_row_major() {
        let m = Matrix::from_fn(3, |i, j| (i * 10 + j) as f64);
        assert_eq!(m.get(0, 2), 2.0);
        assert_eq!(m.get(2, 1), 21.0);
        assert_eq!(m.row(1), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Matrix::random(8, 42);
        let b = Matrix::random(8, 42);
        let c = Matrix::random(8, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_slice().iter().all(|&v| (0.0..=9.0).contains(&v) && v.fract() == 0.0));
    }

    #[test]
    fn test_flat_copy_roundtrip() {
        let m = Matrix::from_fn(4, |i, j| (i + j) as f64);
        let mut flat = vec![0.0; 16];
        m.copy_to_flat(&mut flat).unwrap();
        assert_eq!(flat[5], 2.0);

        let mut back = Matrix::zeros(4);
        back.copy_from_flat(&flat).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_flat_copy_wrong_len() {
        let m = Matrix::zeros(2);
        let mut flat = vec![0.0; 3];
        assert!(m.copy_to_flat(&mut flat).is_err());
    }

    #[test]
    fn test_set_and_clear() {
        let mut m = Matrix::zeros(2);
        m.set(1, 0, 5.0);
        assert_eq!(m.get(1, 0), 5.0);
        m.clear();
        assert_eq!(m.get(1, 0), 0.0);
    }

    #[test]
    fn test_check_same_size() {
        assert!(Matrix::zeros(2).check_same_size(&Matrix::zeros(2)).is_ok());
        assert!(Matrix::zeros(2).check_same_size(&Matrix::zeros(3)).is_err());
    }
}
