/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! PageRank by damped power iteration.
//!
//! The input is the weighted adjacency matrix *G* of a graph, with the
//! convention that *gᵢⱼ* > 0 is the weight of the arc from *j* to *i*: column
//! *j* lists the outgoing arcs of node *j*.
//!
//! # The formula
//!
//! Let *P* be the column-normalized adjacency matrix (with zero columns for
//! dangling nodes, see [`Transition`]), **d** the characteristic vector of
//! dangling nodes, **v** the preference vector (uniform by default), and α
//! the damping factor. Each iteration computes
//!
//! > **p**⁽*ᵗ* ⁺ ¹⁾ = α *P* **p**⁽*ᵗ*⁾ + α (**d** · **p**⁽*ᵗ*⁾) **u** + (1 − α) **v**
//!
//! starting from **p**⁽⁰⁾ = **v**. The vector **u** is the distribution of the
//! rank of dangling nodes, and depends on the [`Mode`]: it is **v** in the
//! [strongly preferential](Mode::StronglyPreferential) case and uniform in the
//! [weakly preferential](Mode::WeaklyPreferential) case. With the default
//! uniform preference vector the two modes coincide and every entry of the
//! last two terms is equal to α (**d** · **p**⁽*ᵗ*⁾) / *n* + (1 − α) / *n*.
//!
//! Since the rank of dangling nodes is redistributed rather than lost, every
//! approximation is a probability distribution.
//!
//! # Stopping criteria
//!
//! The computation converges when the ℓ∞ distance between two successive
//! approximations, that is, the maximum absolute change of a component, is at
//! most the [tolerance](PageRank::tolerance) (by default 10⁻⁸).
//!
//! Since for some inputs (e.g., α = 1 on a periodic graph) the iteration never
//! converges, the [`run`](PageRank::run) method accepts a composable
//! [`Predicate`] that is evaluated after each iteration that did not
//! converge; if it evaluates to true, the computation gives up and returns
//! [`PageRankError::NonConvergence`], which carries the last approximation.
//!
//! # Parallelism
//!
//! The product *P* **p** and the update of the rank vector are computed in
//! parallel in the current Rayon thread pool. Each row of the product is
//! summed sequentially and the rank of dangling nodes is summed sequentially
//! using Kahan summation, so the result does not depend on the number of
//! threads.
//!
//! [`Predicate`]: predicates::Predicate

pub mod preds {
    //! Predicates implementing give-up conditions.
    //!
    //! The implementation of [PageRank](super::PageRank) stops by itself when
    //! it converges; these predicates decide when to stop iterating without
    //! convergence. They evaluate to true if the computation should be
    //! abandoned.
    //!
    //! You can combine the predicates using the `and` and `or` methods provided
    //! by the [`Predicate`] trait.
    //!
    //! # Examples
    //! ```
    //! use predicates::prelude::*;
    //! use sprank_algo::rank::pagerank::preds::{MaxIter, MaxTime};
    //! use std::time::Duration;
    //!
    //! let mut predicate = MaxIter::from(1000).boxed();
    //! predicate = predicate.or(MaxTime::from(Duration::from_secs(60))).boxed();
    //! ```

    use predicates::{Predicate, reflection::PredicateReflection};
    use std::fmt::Display;
    use std::time::Duration;

    #[doc(hidden)]
    /// This structure is passed to stopping predicates to provide the
    /// information that is needed to evaluate them.
    #[derive(Debug)]
    pub struct PredParams {
        pub iteration: usize,
        pub max_delta: f64,
        pub elapsed: Duration,
    }

    /// Gives up after at most the provided number of iterations.
    #[derive(Debug, Clone)]
    pub struct MaxIter {
        max_iter: usize,
    }

    impl MaxIter {
        pub const DEFAULT_MAX_ITER: usize = 10_000;
    }

    impl From<usize> for MaxIter {
        fn from(max_iter: usize) -> Self {
            MaxIter { max_iter }
        }
    }

    impl Default for MaxIter {
        fn default() -> Self {
            Self::from(Self::DEFAULT_MAX_ITER)
        }
    }

    impl Display for MaxIter {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(max iter: {})", self.max_iter))
        }
    }

    impl PredicateReflection for MaxIter {}

    impl Predicate<PredParams> for MaxIter {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.iteration >= self.max_iter
        }
    }

    /// Gives up once the computation has been running for the provided
    /// duration.
    ///
    /// The check happens between iterations, so the computation can run
    /// longer than the deadline by at most one iteration.
    #[derive(Debug, Clone)]
    pub struct MaxTime {
        max_time: Duration,
    }

    impl From<Duration> for MaxTime {
        fn from(max_time: Duration) -> Self {
            MaxTime { max_time }
        }
    }

    impl Display for MaxTime {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(max time: {:?})", self.max_time))
        }
    }

    impl PredicateReflection for MaxTime {}

    impl Predicate<PredParams> for MaxTime {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.elapsed >= self.max_time
        }
    }
}

/// Selects the distribution of the rank of dangling nodes.
///
/// See the [module-level documentation](self) for the mathematical details.
/// The two modes differ only when a preference vector is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Uses the preference vector **v** as the dangling-node distribution
    /// (**u** = **v**). This is the default.
    #[default]
    StronglyPreferential,
    /// Uses a uniform dangling-node distribution (**u** = **1**/*n*) regardless
    /// of the preference vector.
    WeaklyPreferential,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::StronglyPreferential => f.write_str("strongly preferential"),
            Mode::WeaklyPreferential => f.write_str("weakly preferential"),
        }
    }
}

use super::Transition;
use dsi_progress_logger::{ProgressLog, no_logging};
use kahan::KahanSum;
use predicates::Predicate;
use rayon::prelude::*;
use sprank::matrix::{MatrixError, SparseMatrix};
use sprank::utils::Granularity;
use std::time::Instant;
use thiserror::Error;

/// Errors raised by [`PageRank`].
///
/// All errors but [`NonConvergence`](Self::NonConvergence) are detected
/// before the first iteration.
#[derive(Error, Debug)]
pub enum PageRankError {
    #[error("The graph has no nodes")]
    EmptyGraph,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The give-up predicate was satisfied before convergence; `rank` is the
    /// last approximation computed.
    #[error(
        "PageRank did not converge after {iterations} iteration(s) (max delta = {max_delta})"
    )]
    NonConvergence {
        iterations: usize,
        max_delta: f64,
        rank: Vec<f64>,
    },
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Computes PageRank using damped power iteration.
///
/// The struct is configured via setters and then executed via
/// [`run`](Self::run). After completion the rank vector is available via the
/// [`rank`](Self::rank) method.
///
/// # Examples
///
/// Default PageRank (α = 0.85, uniform preference) on a small graph:
///
/// ```
/// use sprank::prelude::*;
/// use sprank_algo::rank::pagerank::{PageRank, preds};
///
/// // Arcs 0 → 1, 0 → 2, 1 → 2, 2 → 0, 3 → 0; 4 is dangling
/// let g = SparseMatrix::from_triplets(
///     5,
///     5,
///     [(1, 0, 1.0), (2, 0, 1.0), (2, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0)],
/// )?;
///
/// let mut pr = PageRank::new(&g)?;
/// pr.run(preds::MaxIter::default())?;
///
/// assert_eq!(pr.rank().len(), 5);
/// assert!((pr.rank().iter().sum::<f64>() - 1.0).abs() < 1E-9);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// Weakly preferential PageRank with a custom preference vector:
///
/// ```
/// use sprank::prelude::*;
/// use sprank_algo::rank::pagerank::{Mode, PageRank, preds};
///
/// let g = SparseMatrix::from_triplets(
///     5,
///     5,
///     [(1, 0, 1.0), (2, 0, 1.0), (2, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0)],
/// )?;
///
/// // Custom preference: favor node 0
/// let pref = [0.5, 0.2, 0.1, 0.1, 0.1];
///
/// let mut pr = PageRank::new(&g)?;
/// pr.alpha(0.9)?
///     .preference(Some(&pref[..]))?
///     .mode(Mode::WeaklyPreferential);
/// pr.run(preds::MaxIter::default())?;
///
/// // Node 0 has the highest rank
/// assert!(pr.rank()[0] > pr.rank()[1]);
/// assert!((pr.rank().iter().sum::<f64>() - 1.0).abs() < 1E-9);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PageRank<'a> {
    transition: Transition,
    alpha: f64,
    tolerance: f64,
    preference: Option<&'a [f64]>,
    mode: Mode,
    granularity: Granularity,
    max_delta: f64,

    rank: Box<[f64]>,
    iteration: usize,
}

impl std::fmt::Debug for PageRank<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRank")
            .field("alpha", &self.alpha)
            .field("tolerance", &self.tolerance)
            .field("mode", &self.mode)
            .field("granularity", &self.granularity)
            .field("max_delta", &self.max_delta)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

impl<'a> PageRank<'a> {
    pub const DEFAULT_ALPHA: f64 = 0.85;
    pub const DEFAULT_TOLERANCE: f64 = 1E-8;

    /// Creates a new PageRank computation for the graph with the given
    /// weighted adjacency matrix.
    ///
    /// The transition matrix is built immediately; the adjacency matrix is
    /// not retained.
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InvalidParameter`] if the matrix is not square
    /// and [`PageRankError::EmptyGraph`] if it has no rows.
    pub fn new(graph: &SparseMatrix) -> Result<Self, PageRankError> {
        if !graph.is_square() {
            return Err(PageRankError::InvalidParameter(format!(
                "The adjacency matrix must be square, got {} × {}",
                graph.num_rows(),
                graph.num_cols()
            )));
        }
        let n = graph.num_rows();
        if n == 0 {
            return Err(PageRankError::EmptyGraph);
        }
        Ok(Self {
            transition: Transition::new(graph),
            alpha: Self::DEFAULT_ALPHA,
            tolerance: Self::DEFAULT_TOLERANCE,
            preference: None,
            mode: Mode::default(),
            granularity: Granularity::default(),
            max_delta: f64::INFINITY,
            rank: vec![1.0 / n as f64; n].into_boxed_slice(),
            iteration: 0,
        })
    }

    /// Sets the damping factor α.
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InvalidParameter`] if `alpha` is not in the
    /// interval [0 . . 1].
    pub fn alpha(&mut self, alpha: f64) -> Result<&mut Self, PageRankError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(PageRankError::InvalidParameter(format!(
                "The damping factor must be in [0 . . 1], got {alpha}"
            )));
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// Sets the convergence tolerance, that is, the maximum absolute change of
    /// a component between two successive approximations.
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::InvalidParameter`] if `tolerance` is not
    /// positive.
    pub fn tolerance(&mut self, tolerance: f64) -> Result<&mut Self, PageRankError> {
        if tolerance.is_nan() || tolerance <= 0.0 {
            return Err(PageRankError::InvalidParameter(format!(
                "The tolerance must be positive, got {tolerance}"
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Sets the preference (personalization) vector.
    ///
    /// When set, the preference vector is used as the starting point of the
    /// iteration, as the teleportation distribution and, in
    /// [`StronglyPreferential`](Mode::StronglyPreferential) mode, as the
    /// dangling-node distribution.
    ///
    /// Pass `None` to revert to the uniform preference (1/*n*).
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::DimensionMismatch`] if the length of the
    /// vector does not match the number of nodes, and
    /// [`PageRankError::InvalidParameter`] if the vector is not stochastic
    /// (nonnegative entries summing to 1 within a tolerance of 1E-6).
    pub fn preference(&mut self, preference: Option<&'a [f64]>) -> Result<&mut Self, PageRankError> {
        if let Some(v) = preference {
            let n = self.rank.len();
            if v.len() != n {
                return Err(PageRankError::DimensionMismatch {
                    expected: n,
                    actual: v.len(),
                });
            }
            check_stochastic(v, "preference")?;
        }
        self.preference = preference;
        Ok(self)
    }

    /// Sets the PageRank [mode](Mode).
    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Sets the parallel task granularity.
    ///
    /// The granularity expresses how many
    /// [rows](Granularity::row_granularity) of the transition matrix will be
    /// passed to a Rayon task at a time.
    pub fn granularity(&mut self, granularity: Granularity) -> &mut Self {
        self.granularity = granularity;
        self
    }

    /// Returns the transition matrix and the dangling nodes.
    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    /// Returns the rank vector.
    ///
    /// After calling [`run`](Self::run), this contains the computed PageRank
    /// values (or the last approximation, if the computation gave up).
    pub fn rank(&self) -> &[f64] {
        &self.rank
    }

    /// Consumes this computation, returning the rank vector.
    pub fn into_rank(self) -> Box<[f64]> {
        self.rank
    }

    /// Returns the number of iterations performed by the last call to
    /// [`run`](Self::run).
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// Returns the ℓ∞ distance between the last two approximations.
    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }

    /// Runs the PageRank computation until convergence, or until the given
    /// give-up predicate is satisfied.
    ///
    /// Returns the number of iterations performed.
    pub fn run(
        &mut self,
        give_up: impl Predicate<preds::PredParams>,
    ) -> Result<usize, PageRankError> {
        self.run_with_logging(give_up, no_logging![])
    }

    /// Runs the PageRank computation until convergence, or until the given
    /// give-up predicate is satisfied, logging progress.
    ///
    /// `pl` is a [`ProgressLog`] used for iteration counting. Its options will
    /// be preserved, making thus possible to customize the logs.
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::NonConvergence`] if the give-up predicate is
    /// satisfied before convergence.
    pub fn run_with_logging(
        &mut self,
        give_up: impl Predicate<preds::PredParams>,
        pl: &mut impl ProgressLog,
    ) -> Result<usize, PageRankError> {
        let n = self.rank.len();

        log::info!("Mode: {}", self.mode);
        log::info!("Alpha: {}", self.alpha);
        log::info!("Tolerance: {}", self.tolerance);
        log::info!(
            "Preference: {}",
            if self.preference.is_some() {
                "custom"
            } else {
                "uniform"
            }
        );
        log::info!("Give-up criterion: {}", give_up);
        log::info!("{} dangling nodes", self.transition.num_dangling());

        self.iteration = 0;
        self.max_delta = f64::INFINITY;
        let inv_n = 1.0 / n as f64;

        // Fill rank with preference vector
        match self.preference {
            Some(v) => self.rank.copy_from_slice(v),
            None => self.rank.fill(inv_n),
        }

        let alpha = self.alpha;
        let mode = self.mode;
        let preference = self.preference;
        let min_len = self
            .granularity
            .row_granularity(n, self.transition.matrix().num_entries() as u64);

        let mut previous = vec![0.0; n].into_boxed_slice();
        let start = Instant::now();

        pl.item_name("iteration");
        pl.expected_updates(None);
        pl.start(format!("Computing PageRank (alpha={alpha})..."));

        loop {
            std::mem::swap(&mut self.rank, &mut previous);

            let mut dangling_rank = KahanSum::<f64>::new();
            for (&x, &d) in previous.iter().zip(self.transition.dangling()) {
                if d {
                    dangling_rank += x;
                }
            }
            let dangling_rank = dangling_rank.sum();

            self.transition
                .matrix()
                .par_mul_vec_into(&previous, &mut self.rank, self.granularity)?;

            // Contribution of dangling nodes and teleportation; it is the
            // same for all nodes if the preference is uniform
            let uniform = alpha * dangling_rank * inv_n + (1.0 - alpha) * inv_n;
            let previous = &previous;
            self.max_delta = self
                .rank
                .par_iter_mut()
                .with_min_len(min_len)
                .enumerate()
                .map(|(i, x)| {
                    let extra = match preference {
                        None => uniform,
                        Some(v) => {
                            let u_i = match mode {
                                Mode::StronglyPreferential => v[i],
                                Mode::WeaklyPreferential => inv_n,
                            };
                            alpha * dangling_rank * u_i + (1.0 - alpha) * v[i]
                        }
                    };
                    *x = alpha * *x + extra;
                    delta(*x, previous[i])
                })
                .reduce(|| 0.0, f64::max);

            self.iteration += 1;

            log::info!(
                "Iteration {}: max delta = {}",
                self.iteration,
                self.max_delta
            );

            pl.update_and_display();

            if self.max_delta <= self.tolerance {
                pl.done();
                log::info!(
                    "Converged after {} iteration(s), max delta = {}",
                    self.iteration,
                    self.max_delta
                );
                return Ok(self.iteration);
            }

            if give_up.eval(&preds::PredParams {
                iteration: self.iteration,
                max_delta: self.max_delta,
                elapsed: start.elapsed(),
            }) {
                pl.done();
                log::warn!(
                    "Giving up after {} iteration(s), max delta = {}",
                    self.iteration,
                    self.max_delta
                );
                return Err(PageRankError::NonConvergence {
                    iterations: self.iteration,
                    max_delta: self.max_delta,
                    rank: self.rank.to_vec(),
                });
            }
        }
    }
}

/// Checks that a vector is stochastic (all entries nonnegative and summing
/// to 1 within a tolerance of 1E-6).
fn check_stochastic(v: &[f64], name: &str) -> Result<(), PageRankError> {
    if let Some((i, &x)) = v
        .iter()
        .enumerate()
        .find(|&(_, &x)| x.is_nan() || x < 0.0)
    {
        return Err(PageRankError::InvalidParameter(format!(
            "The {name} vector has an invalid entry at index {i}: {x}"
        )));
    }
    let mut sum = KahanSum::<f64>::new();
    for &x in v {
        sum += x;
    }
    let sum = sum.sum();
    if sum.is_nan() || (sum - 1.0).abs() >= 1E-6 {
        return Err(PageRankError::InvalidParameter(format!(
            "The {name} vector is not stochastic (sum = {sum})"
        )));
    }
    Ok(())
}

/// Computes PageRank of the graph with the given weighted adjacency matrix
/// using uniform preference, the default tolerance, and the default
/// [iteration cap](preds::MaxIter::DEFAULT_MAX_ITER).
///
/// Returns the rank vector and the number of iterations.
///
/// # Errors
///
/// Returns [`PageRankError::InvalidParameter`] if `alpha` is not in [0 . . 1]
/// or the matrix is not square, [`PageRankError::EmptyGraph`] if the matrix
/// is empty, and [`PageRankError::NonConvergence`] if the iteration cap is
/// reached.
pub fn page_rank(graph: &SparseMatrix, alpha: f64) -> Result<(Vec<f64>, usize), PageRankError> {
    let mut pr = PageRank::new(graph)?;
    pr.alpha(alpha)?;
    let iterations = pr.run(preds::MaxIter::default())?;
    Ok((pr.into_rank().into_vec(), iterations))
}

/// Returns the absolute difference between two scores, or infinity if it
/// is NaN, so that NaN scores never pass the convergence test.
fn delta(current: f64, previous: f64) -> f64 {
    let d = (current - previous).abs();
    if d.is_nan() { f64::INFINITY } else { d }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_stochastic() {
        assert!(check_stochastic(&[0.5, 0.5], "test").is_ok());
        assert!(check_stochastic(&[1.0], "test").is_ok());
        assert!(check_stochastic(&[0.5, 0.6], "test").is_err());
        assert!(check_stochastic(&[1.5, -0.5], "test").is_err());
        assert!(check_stochastic(&[f64::NAN, 1.0], "test").is_err());
    }

    #[test]
    fn test_delta() {
        assert_eq!(delta(0.25, 0.5), 0.25);
        assert_eq!(delta(0.5, 0.5), 0.0);
        assert_eq!(delta(f64::NAN, 0.5), f64::INFINITY);
        assert_eq!(delta(0.5, f64::NAN), f64::INFINITY);
        // A NaN delta must not vanish in the reduction
        let max = [0.0, delta(f64::NAN, 0.0), 1E-3]
            .into_iter()
            .fold(0.0, f64::max);
        assert_eq!(max, f64::INFINITY);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::default().to_string(), "strongly preferential");
        assert_eq!(
            Mode::WeaklyPreferential.to_string(),
            "weakly preferential"
        );
    }

    #[test]
    fn test_pred_display() {
        assert_eq!(preds::MaxIter::from(5).to_string(), "(max iter: 5)");
        assert_eq!(
            preds::MaxTime::from(std::time::Duration::from_secs(1)).to_string(),
            "(max time: 1s)"
        );
    }
}
