/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Ranking algorithms.

pub mod pagerank;
pub use pagerank::{Mode, PageRank, PageRankError, page_rank};

mod transition;
pub use transition::Transition;
