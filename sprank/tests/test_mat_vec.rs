/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sprank::prelude::*;

/// Builds a random square matrix with about `density · n²` stored entries,
/// including some duplicate insertions.
fn random_matrix(n: usize, density: f64, seed: u64) -> Result<SparseMatrix> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut builder = SparseMatrix::builder(n, n);
    for i in 0..n {
        for j in 0..n {
            if rng.random_bool(density) {
                builder.add(i, j, rng.random::<f64>())?;
            }
        }
    }
    for _ in 0..n {
        let i = rng.random_range(0..n);
        let j = rng.random_range(0..n);
        builder.add(i, j, rng.random::<f64>())?;
    }
    Ok(builder.build()?)
}

fn random_vector(n: usize, rng: &mut SmallRng) -> Vec<f64> {
    (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
}

fn l_inf_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_linearity() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(42);
    for (n, density) in [(1, 1.0), (10, 0.3), (100, 0.05), (500, 0.01)] {
        let m = random_matrix(n, density, n as u64)?;
        for _ in 0..5 {
            let x = random_vector(n, &mut rng);
            let y = random_vector(n, &mut rng);
            let a = rng.random_range(-10.0..10.0);
            let b = rng.random_range(-10.0..10.0);

            let combined: Vec<f64> = x.iter().zip(&y).map(|(x, y)| a * x + b * y).collect();
            let lhs = mat_vec(&m, &combined)?;

            let mx = mat_vec(&m, &x)?;
            let my = mat_vec(&m, &y)?;
            let rhs: Vec<f64> = mx.iter().zip(&my).map(|(x, y)| a * x + b * y).collect();

            assert!(
                l_inf_distance(&lhs, &rhs) < 1E-9,
                "n={n}: L∞={}",
                l_inf_distance(&lhs, &rhs)
            );
        }
    }
    Ok(())
}

#[test]
fn test_zero_matrix() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(0);
    for n in [1, 7, 100] {
        let m = SparseMatrix::empty(n, n);
        let x = random_vector(n, &mut rng);
        assert_eq!(mat_vec(&m, &x)?, vec![0.0; n]);
    }
    Ok(())
}

#[test]
fn test_zero_vector() -> Result<()> {
    let m = random_matrix(50, 0.1, 1)?;
    assert_eq!(mat_vec(&m, &[0.0; 50])?, vec![0.0; 50]);
    Ok(())
}

#[test]
fn test_against_dense() -> Result<()> {
    let n = 60;
    let m = random_matrix(n, 0.2, 7)?;
    let mut rng = SmallRng::seed_from_u64(7);
    let x = random_vector(n, &mut rng);

    let expected: Vec<f64> = (0..n)
        .map(|i| (0..n).map(|j| m.get(i, j) * x[j]).sum())
        .collect();
    assert!(l_inf_distance(&mat_vec(&m, &x)?, &expected) < 1E-12);
    Ok(())
}

#[test]
fn test_duplicates_accumulate() -> Result<()> {
    let m = SparseMatrix::from_triplets(2, 2, [(0, 1, 1.0), (0, 1, 1.0), (1, 0, 3.0)])?;
    assert_eq!(mat_vec(&m, &[1.0, 1.0])?, vec![2.0, 3.0]);
    Ok(())
}

#[test]
fn test_dimension_mismatch() -> Result<()> {
    let m = random_matrix(10, 0.5, 3)?;
    for len in [0, 9, 11] {
        match mat_vec(&m, &vec![1.0; len]) {
            Err(MatrixError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 10);
                assert_eq!(actual, len);
            }
            other => panic!("Expected a dimension mismatch, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn test_parallel_is_identical() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(11);
    for (n, density) in [(1, 1.0), (33, 0.2), (1000, 0.005)] {
        let m = random_matrix(n, density, 2 * n as u64)?;
        let x = random_vector(n, &mut rng);
        let sequential = mat_vec(&m, &x)?;
        for granularity in [
            Granularity::Rows(1),
            Granularity::Rows(7),
            Granularity::default(),
            Granularity::Entries(10),
        ] {
            let mut parallel = vec![0.0; n];
            m.par_mul_vec_into(&x, &mut parallel, granularity)?;
            assert_eq!(sequential, parallel, "n={n} granularity={granularity:?}");
        }
    }
    Ok(())
}

#[test]
fn test_parallel_dimension_mismatch() -> Result<()> {
    let m = random_matrix(5, 0.5, 5)?;
    let mut y = vec![0.0; 5];
    assert!(
        m.par_mul_vec_into(&[1.0; 4], &mut y, Granularity::default())
            .is_err()
    );
    Ok(())
}

#[cfg(feature = "serde")]
#[test]
fn test_serde() -> Result<()> {
    let m = random_matrix(20, 0.2, 9)?;
    let json = serde_json::to_string(&m)?;
    let back: SparseMatrix = serde_json::from_str(&json)?;
    assert_eq!(m, back);
    assert_eq!(mat_vec(&m, &[1.0; 20])?, mat_vec(&back, &[1.0; 20])?);
    Ok(())
}
