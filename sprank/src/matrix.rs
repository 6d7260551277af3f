/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sparse matrices in compressed sparse row form.
//!
//! A [`SparseMatrix`] is immutable: it is assembled by a
//! [`SparseMatrixBuilder`], which accepts entries in any order and sums
//! entries inserted more than once at the same position. Zero weights are
//! accepted but never stored, so a row or column has a stored entry if and
//! only if its sum is positive.
//!
//! When a matrix is used as the weighted adjacency matrix of a graph, the
//! convention is that the entry in row *i* and column *j* is the weight of
//! the arc from *j* to *i*: column *j* lists the outgoing arcs of node *j*.

use thiserror::Error;

/// Errors raised while building or multiplying sparse matrices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("Dimension mismatch: expected a vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Entry ({row}, {col}) is out of bounds for a {rows} × {cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error(
        "Invalid weight {weight} for entry ({row}, {col}): weights must be finite and nonnegative"
    )]
    InvalidWeight { row: usize, col: usize, weight: f64 },
    #[error("Cannot allocate the row offsets of a matrix with {rows} rows")]
    TooManyRows { rows: usize },
}

/// An immutable sparse matrix of `f64` in compressed sparse row (CSR) form.
///
/// The stored entries of row *i* are at positions `offsets[i]..offsets[i +
/// 1]` of the parallel arrays `columns` and `values`; within a row, column
/// indices are strictly increasing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    num_cols: usize,
    /// The first offset is always zero, and there is one more offset than
    /// there are rows.
    offsets: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Returns a builder for a matrix with the given shape.
    pub fn builder(num_rows: usize, num_cols: usize) -> SparseMatrixBuilder {
        SparseMatrixBuilder::new(num_rows, num_cols)
    }

    /// Creates a matrix with the given shape and no stored entries.
    pub fn empty(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_cols,
            offsets: vec![0; num_rows + 1],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates a matrix from triples (row, column, weight).
    ///
    /// Triples with the same row and column are summed.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self, MatrixError> {
        let mut builder = SparseMatrixBuilder::new(num_rows, num_cols);
        builder.extend(triplets)?;
        builder.build()
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the number of columns.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Returns the number of stored (hence positive) entries.
    pub fn num_entries(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the matrix has as many rows as columns.
    pub fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols
    }

    /// Returns the value of the entry at the given position, or zero if the
    /// entry is not stored or the position is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.num_rows() || col >= self.num_cols {
            return 0.0;
        }
        let range = self.offsets[row]..self.offsets[row + 1];
        match self.columns[range.clone()].binary_search(&col) {
            Ok(pos) => self.values[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Returns an iterator over the stored entries of a row as pairs (column,
    /// value), in increasing column order.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not smaller than the number of rows.
    pub fn row(&self, row: usize) -> impl ExactSizeIterator<Item = (usize, f64)> + '_ {
        let range = self.offsets[row]..self.offsets[row + 1];
        self.columns[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Returns an iterator over all stored entries as triples (row, column,
    /// value) in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.num_rows()).flat_map(move |row| self.row(row).map(move |(col, v)| (row, col, v)))
    }

    /// Returns, for each column, the sum of its stored entries.
    ///
    /// For an adjacency matrix, this is the total outgoing weight of each
    /// node.
    pub fn column_totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.num_cols];
        for (&col, &value) in self.columns.iter().zip(self.values.iter()) {
            totals[col] += value;
        }
        totals
    }

    /// Returns, for each column, whether it contains at least one stored
    /// entry.
    pub fn column_occupancy(&self) -> Vec<bool> {
        let mut occupied = vec![false; self.num_cols];
        for &col in self.columns.iter() {
            occupied[col] = true;
        }
        occupied
    }

    /// Returns a new matrix with the same shape and the same stored positions,
    /// whose values are obtained by applying `f` to (row, column, value).
    ///
    /// Positions are kept even if `f` maps them to zero.
    pub fn map_values(&self, mut f: impl FnMut(usize, usize, f64) -> f64) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for row in 0..self.num_rows() {
            values.extend(self.row(row).map(|(col, value)| f(row, col, value)));
        }
        Self {
            num_cols: self.num_cols,
            offsets: self.offsets.clone(),
            columns: self.columns.clone(),
            values,
        }
    }
}

/// Accumulates the entries of a [`SparseMatrix`] with a fixed shape.
///
/// Entries can be added in any order. Entries added more than once at the
/// same position are summed, never overwritten.
///
/// # Examples
///
/// ```
/// use sprank::matrix::SparseMatrixBuilder;
///
/// let mut builder = SparseMatrixBuilder::new(2, 2);
/// builder.add(1, 0, 1.0)?.add(1, 0, 2.0)?.add(0, 1, 0.5)?;
/// let m = builder.build()?;
/// assert_eq!(m.get(1, 0), 3.0);
/// assert_eq!(m.get(0, 1), 0.5);
/// assert_eq!(m.num_entries(), 2);
/// # Ok::<(), sprank::matrix::MatrixError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SparseMatrixBuilder {
    num_rows: usize,
    num_cols: usize,
    triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Creates a builder for a matrix with the given shape.
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            triplets: Vec::new(),
        }
    }

    /// Adds `weight` to the entry at the given position.
    ///
    /// Zero weights are checked but not stored.
    pub fn add(&mut self, row: usize, col: usize, weight: f64) -> Result<&mut Self, MatrixError> {
        if row >= self.num_rows || col >= self.num_cols {
            return Err(MatrixError::IndexOutOfBounds {
                row,
                col,
                rows: self.num_rows,
                cols: self.num_cols,
            });
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(MatrixError::InvalidWeight { row, col, weight });
        }
        if weight != 0.0 {
            self.triplets.push((row, col, weight));
        }
        Ok(self)
    }

    /// Adds all triples (row, column, weight) returned by an iterator.
    pub fn extend(
        &mut self,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<&mut Self, MatrixError> {
        for (row, col, weight) in triplets {
            self.add(row, col, weight)?;
        }
        Ok(self)
    }

    /// Builds the matrix, summing duplicate entries.
    ///
    /// Duplicates are summed in insertion order. Fails with
    /// [`MatrixError::InvalidWeight`] if a sum overflows to infinity, and with
    /// [`MatrixError::TooManyRows`] if the row offsets cannot be allocated.
    pub fn build(mut self) -> Result<SparseMatrix, MatrixError> {
        self.triplets.sort_by_key(|&(row, col, _)| (row, col));

        let too_many_rows = MatrixError::TooManyRows {
            rows: self.num_rows,
        };
        let num_offsets = self.num_rows.checked_add(1).ok_or(too_many_rows.clone())?;
        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(num_offsets)
            .map_err(|_| too_many_rows)?;
        let mut columns = Vec::with_capacity(self.triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(self.triplets.len());
        offsets.push(0);

        let mut current_row = 0;
        for (row, col, weight) in self.triplets {
            while current_row < row {
                offsets.push(columns.len());
                current_row += 1;
            }
            let start = offsets[current_row];
            if columns[start..].last() == Some(&col) {
                if let Some(last) = values.last_mut() {
                    *last += weight;
                    if !last.is_finite() {
                        return Err(MatrixError::InvalidWeight {
                            row,
                            col,
                            weight: *last,
                        });
                    }
                }
            } else {
                columns.push(col);
                values.push(weight);
            }
        }
        offsets.resize(num_offsets, columns.len());

        log::debug!(
            "Built a {} × {} sparse matrix with {} entries",
            self.num_rows,
            self.num_cols,
            values.len()
        );

        Ok(SparseMatrix {
            num_cols: self.num_cols,
            offsets,
            columns,
            values,
        })
    }
}
