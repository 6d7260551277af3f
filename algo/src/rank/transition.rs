/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use sprank::matrix::SparseMatrix;

/// The transition matrix of a weighted graph and its dangling nodes.
///
/// Given the weighted adjacency matrix *G* of a graph, the transition matrix
/// *P* has *pᵢⱼ* = *gᵢⱼ* / *tⱼ*, where *tⱼ* is the sum of column *j* of *G*
/// (the total outgoing weight of node *j*). Columns of *P* are stochastic,
/// except for the columns of dangling nodes, which are empty.
///
/// A node is dangling if its column in *G* contains no stored entry. Since
/// [`SparseMatrix`] never stores zero weights, this is the same as having
/// zero total outgoing weight, and *P* never contains a division by zero.
///
/// If the total of a column overflows, the column is first divided by its
/// largest entry, so that columns of *P* remain stochastic for every finite
/// weight.
#[derive(Debug, Clone)]
pub struct Transition {
    matrix: SparseMatrix,
    dangling: Box<[bool]>,
    num_dangling: usize,
}

impl Transition {
    /// Builds the transition matrix of the given weighted adjacency matrix.
    ///
    /// The adjacency matrix is not modified.
    pub fn new(graph: &SparseMatrix) -> Self {
        let mut totals = graph.column_totals();
        let mut scale = vec![1.0; graph.num_cols()];
        if totals.iter().any(|total| total.is_infinite()) {
            for (_, col, weight) in graph.iter() {
                if totals[col].is_infinite() {
                    scale[col] = f64::max(scale[col], weight);
                }
            }
            for (col, total) in totals.iter_mut().enumerate() {
                if scale[col] != 1.0 {
                    *total = 0.0;
                }
            }
            for (_, col, weight) in graph.iter() {
                if scale[col] != 1.0 {
                    totals[col] += weight / scale[col];
                }
            }
            log::debug!(
                "Rescaled {} column(s) with overflowing totals",
                scale.iter().filter(|&&s| s != 1.0).count()
            );
        }
        let matrix = graph.map_values(|_, col, weight| weight / scale[col] / totals[col]);
        let dangling: Box<[bool]> = graph
            .column_occupancy()
            .into_iter()
            .map(|occupied| !occupied)
            .collect();
        let num_dangling = dangling.iter().filter(|&&d| d).count();
        Self {
            matrix,
            dangling,
            num_dangling,
        }
    }

    /// Returns the transition matrix.
    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    /// Returns the characteristic vector of dangling nodes.
    pub fn dangling(&self) -> &[bool] {
        &self.dangling
    }

    /// Returns the number of dangling nodes.
    pub fn num_dangling(&self) -> usize {
        self.num_dangling
    }
}
