/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sparse matrix–vector multiplication.
//!
//! All products compute *y* = *M* **x**, that is, *yᵢ* = ∑ⱼ *mᵢⱼ* *xⱼ*, where
//! the sum ranges over the stored entries of row *i*. Dimensions are checked
//! before any work is done, so an error never leaves a partially computed
//! vector behind.
//!
//! The parallel version splits rows among Rayon tasks, but each row is still
//! summed sequentially in increasing column order: its output is identical,
//! bit by bit, to that of the sequential version.

use crate::matrix::{MatrixError, SparseMatrix};
use crate::utils::Granularity;
use rayon::prelude::*;

/// Returns the product of a sparse matrix and a dense vector.
///
/// # Errors
///
/// Returns [`MatrixError::DimensionMismatch`] if the length of `x` is not the
/// number of columns of `matrix`.
///
/// # Examples
///
/// ```
/// use sprank::prelude::*;
///
/// let m = SparseMatrix::from_triplets(2, 3, [(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)])?;
/// assert_eq!(mat_vec(&m, &[1.0, 1.0, 1.0])?, vec![3.0, 3.0]);
/// assert!(mat_vec(&m, &[1.0, 1.0]).is_err());
/// # Ok::<(), MatrixError>(())
/// ```
pub fn mat_vec(matrix: &SparseMatrix, x: &[f64]) -> Result<Vec<f64>, MatrixError> {
    matrix.mul_vec(x)
}

impl SparseMatrix {
    /// Returns the product of this matrix and `x` in a freshly allocated
    /// vector.
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>, MatrixError> {
        let mut y = vec![0.0; self.num_rows()];
        self.mul_vec_into(x, &mut y)?;
        Ok(y)
    }

    /// Stores the product of this matrix and `x` into `y`.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::DimensionMismatch`] if the length of `x` is not
    /// the number of columns, or the length of `y` is not the number of rows.
    pub fn mul_vec_into(&self, x: &[f64], y: &mut [f64]) -> Result<(), MatrixError> {
        self.check_dims(x, y)?;
        for (i, y_i) in y.iter_mut().enumerate() {
            *y_i = self.row_dot(i, x);
        }
        Ok(())
    }

    /// Stores the product of this matrix and `x` into `y`, processing rows in
    /// parallel in the current Rayon thread pool.
    ///
    /// The granularity sets the minimum number of rows handled by a task.
    pub fn par_mul_vec_into(
        &self,
        x: &[f64],
        y: &mut [f64],
        granularity: Granularity,
    ) -> Result<(), MatrixError> {
        self.check_dims(x, y)?;
        let min_len = granularity.row_granularity(self.num_rows(), self.num_entries() as u64);
        y.par_iter_mut()
            .with_min_len(min_len)
            .enumerate()
            .for_each(|(i, y_i)| *y_i = self.row_dot(i, x));
        Ok(())
    }

    fn check_dims(&self, x: &[f64], y: &[f64]) -> Result<(), MatrixError> {
        if x.len() != self.num_cols() {
            return Err(MatrixError::DimensionMismatch {
                expected: self.num_cols(),
                actual: x.len(),
            });
        }
        if y.len() != self.num_rows() {
            return Err(MatrixError::DimensionMismatch {
                expected: self.num_rows(),
                actual: y.len(),
            });
        }
        Ok(())
    }

    #[inline(always)]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        self.row(row).map(|(col, value)| value * x[col]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let m = SparseMatrix::from_triplets(3, 3, (0..3).map(|i| (i, i, 1.0))).unwrap();
        let x = [0.5, -1.0, 2.0];
        assert_eq!(mat_vec(&m, &x).unwrap(), x.to_vec());
    }

    #[test]
    fn test_rectangular() {
        let m = SparseMatrix::from_triplets(3, 2, [(0, 1, 2.0), (2, 0, 1.0), (2, 1, 1.0)])
            .unwrap();
        assert_eq!(mat_vec(&m, &[3.0, 4.0]).unwrap(), vec![8.0, 0.0, 7.0]);
    }

    #[test]
    fn test_into_mismatched_output() {
        let m = SparseMatrix::empty(3, 2);
        let mut y = vec![1.0; 2];
        assert_eq!(
            m.mul_vec_into(&[1.0, 1.0], &mut y),
            Err(MatrixError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        // The output buffer is left untouched
        assert_eq!(y, vec![1.0; 2]);
    }

    #[test]
    fn test_into_overwrites() {
        let m = SparseMatrix::from_triplets(2, 2, [(0, 1, 1.0)]).unwrap();
        let mut y = vec![7.0; 2];
        m.mul_vec_into(&[1.0, 2.0], &mut y).unwrap();
        assert_eq!(y, vec![2.0, 0.0]);
    }

    #[test]
    fn test_empty() {
        let m = SparseMatrix::empty(0, 0);
        assert_eq!(mat_vec(&m, &[]).unwrap(), Vec::<f64>::new());
    }
}
