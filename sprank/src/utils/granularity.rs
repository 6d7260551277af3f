/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/// Task granularity for parallel row-wise computations.
///
/// Parallel matrix–vector products split the rows of a matrix into tasks
/// handed to Rayon. This enum makes it possible to specify the size of such
/// tasks either by rows or by stored entries; the conversion to a number of
/// rows is performed by [`row_granularity`](Self::row_granularity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Row granularity.
    ///
    /// Each task will be formed by the specified number of rows.
    Rows(usize),
    /// Entry granularity.
    ///
    /// Each task will be formed by a number of rows that has, tentatively,
    /// a number of stored entries equal to the specified number.
    Entries(u64),
}

impl core::default::Default for Granularity {
    /// Returns a default granularity of 1000 rows.
    fn default() -> Self {
        Self::Rows(1000)
    }
}

impl Granularity {
    /// Returns the minimum number of rows per task for a matrix with the given
    /// number of rows and stored entries.
    ///
    /// For the variant [`Rows`](Self::Rows), the specified number of rows is
    /// returned. For the variant [`Entries`](Self::Entries), the number of
    /// rows is computed as the specified number of entries divided by the
    /// average number of entries per row. The result is always at least one.
    pub fn row_granularity(&self, num_rows: usize, num_entries: u64) -> usize {
        match self {
            Self::Rows(n) => (*n).max(1),
            Self::Entries(n) => {
                let average_row_len = num_entries as f64 / num_rows.max(1) as f64;
                if average_row_len == 0.0 {
                    return num_rows.max(1);
                }
                (*n as f64 / average_row_len)
                    .min(usize::MAX as f64)
                    .ceil()
                    .max(1.0) as usize
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows() {
        assert_eq!(Granularity::Rows(10).row_granularity(100, 1000), 10);
        assert_eq!(Granularity::Rows(0).row_granularity(100, 1000), 1);
        assert_eq!(Granularity::default(), Granularity::Rows(1000));
    }

    #[test]
    fn test_entries() {
        // Ten entries per row on average
        assert_eq!(Granularity::Entries(100).row_granularity(100, 1000), 10);
        assert_eq!(Granularity::Entries(5).row_granularity(100, 1000), 1);
        // No entries at all: a single task
        assert_eq!(Granularity::Entries(5).row_granularity(100, 0), 100);
    }
}
