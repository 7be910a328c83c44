//! Linear algebra modulo p
//!
//! Gaussian elimination over Z/pZ for the determinant and solve iterations,
//! plus fraction-free Bareiss elimination for the exact integer determinant
//! used as the denominator hint of a solve.

use super::Iteration;
use crate::field::PrimeField;
use crate::primes::UnusablePrimes;
use anyhow::{anyhow, bail, Result};
use num_bigint::BigInt;
use num_traits::{One, Zero};

fn check_square(matrix: &[Vec<i64>]) -> Result<usize> {
    let n = matrix.len();
    if let Some((i, row)) = matrix.iter().enumerate().find(|(_, row)| row.len() != n) {
        bail!("Matrix is not square: row {} has {} entries, expected {}", i, row.len(), n);
    }
    Ok(n)
}

fn reduce_matrix(field: &PrimeField, matrix: &[Vec<i64>]) -> Vec<Vec<u64>> {
    matrix
        .iter()
        .map(|row| row.iter().map(|&v| field.reduce_i64(v)).collect())
        .collect()
}

/// Index of the first row at or below `col` with a nonzero entry in `col`
fn find_pivot(a: &[Vec<u64>], col: usize) -> Option<usize> {
    (col..a.len()).find(|&r| a[r][col] != 0)
}

/// `det(a) mod p`
pub fn determinant_mod(field: &PrimeField, mut a: Vec<Vec<u64>>) -> Result<u64> {
    let n = a.len();
    let mut det = 1u64;

    for col in 0..n {
        let Some(pivot) = find_pivot(&a, col) else {
            return Ok(0);
        };
        if pivot != col {
            a.swap(pivot, col);
            det = field.neg(det);
        }
        det = field.mul(det, a[col][col]);

        let inv = field
            .inv(a[col][col])
            .ok_or_else(|| anyhow!("pivot has no inverse modulo {}", field.modulus()))?;
        for row in col + 1..n {
            let factor = field.mul(a[row][col], inv);
            if factor == 0 {
                continue;
            }
            for k in col..n {
                let t = field.mul(factor, a[col][k]);
                a[row][k] = field.sub(a[row][k], t);
            }
        }
    }
    Ok(det)
}

/// Solution of `a · x = b` mod p by Gauss-Jordan elimination
///
/// Returns `None` when `a` is singular modulo p.
pub fn solve_mod(field: &PrimeField, mut a: Vec<Vec<u64>>, mut b: Vec<u64>) -> Option<Vec<u64>> {
    let n = a.len();

    for col in 0..n {
        let pivot = find_pivot(&a, col)?;
        a.swap(pivot, col);
        b.swap(pivot, col);

        let inv = field.inv(a[col][col])?;
        for k in col..n {
            a[col][k] = field.mul(a[col][k], inv);
        }
        b[col] = field.mul(b[col], inv);

        for row in 0..n {
            if row == col || a[row][col] == 0 {
                continue;
            }
            let factor = a[row][col];
            for k in col..n {
                let t = field.mul(factor, a[col][k]);
                a[row][k] = field.sub(a[row][k], t);
            }
            let t = field.mul(factor, b[col]);
            b[row] = field.sub(b[row], t);
        }
    }
    Some(b)
}

/// Exact determinant over the integers (Bareiss)
pub fn exact_determinant(matrix: &[Vec<i64>]) -> BigInt {
    let n = matrix.len();
    if n == 0 {
        return BigInt::one();
    }
    let mut a: Vec<Vec<BigInt>> = matrix
        .iter()
        .map(|row| row.iter().map(|&v| BigInt::from(v)).collect())
        .collect();
    let mut negate = false;
    let mut prev = BigInt::one();

    for k in 0..n - 1 {
        if a[k][k].is_zero() {
            match (k + 1..n).find(|&r| !a[r][k].is_zero()) {
                Some(r) => {
                    a.swap(k, r);
                    negate = !negate;
                }
                None => return BigInt::zero(),
            }
        }
        for i in k + 1..n {
            for j in k + 1..n {
                // Exact division: Bareiss keeps every entry a minor of the input
                let v = (&a[i][j] * &a[k][k] - &a[i][k] * &a[k][j]) / &prev;
                a[i][j] = v;
            }
        }
        prev = a[k][k].clone();
    }

    let det = a[n - 1][n - 1].clone();
    if negate {
        -det
    } else {
        det
    }
}

/// `det(A) mod p`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminantMod {
    matrix: Vec<Vec<i64>>,
}

impl DeterminantMod {
    pub fn new(matrix: Vec<Vec<i64>>) -> Result<Self> {
        check_square(&matrix)?;
        Ok(Self { matrix })
    }
}

impl Iteration for DeterminantMod {
    fn evaluate(&self, field: &PrimeField) -> Result<Vec<u64>> {
        let det = determinant_mod(field, reduce_matrix(field, &self.matrix))?;
        Ok(vec![det])
    }
}

/// `x = A^-1 · b mod p`
///
/// Primes dividing `det(A)` are unusable: `A` is singular modulo them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveMod {
    matrix: Vec<Vec<i64>>,
    rhs: Vec<i64>,
    det: BigInt,
}

impl SolveMod {
    pub fn new(matrix: Vec<Vec<i64>>, rhs: Vec<i64>) -> Result<Self> {
        let n = check_square(&matrix)?;
        if rhs.len() != n {
            bail!("Right-hand side has {} entries, expected {}", rhs.len(), n);
        }
        let det = exact_determinant(&matrix);
        if det.is_zero() {
            bail!("Matrix is singular");
        }
        Ok(Self { matrix, rhs, det })
    }

    pub fn determinant(&self) -> &BigInt {
        &self.det
    }
}

impl Iteration for SolveMod {
    fn evaluate(&self, field: &PrimeField) -> Result<Vec<u64>> {
        let a = reduce_matrix(field, &self.matrix);
        let b = self.rhs.iter().map(|&v| field.reduce_i64(v)).collect();
        solve_mod(field, a, b).ok_or_else(|| anyhow!("Matrix is singular modulo {}", field.modulus()))
    }

    fn unusable(&self) -> UnusablePrimes {
        UnusablePrimes::dividing(self.det.clone())
    }
}
