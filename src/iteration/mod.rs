//! Per-prime computations
//!
//! An [`Iteration`] is the opaque computation a worker performs at its
//! assigned prime. It receives the field Z/pZ and returns the residue of the
//! answer modulo p. Iterations must be pure: the same prime always yields the
//! same residue, on any worker.
//!
//! The concrete iterations here are small demonstrations used by the CLI and the
//! tests. Any `Fn(&PrimeField) -> Result<Vec<u64>>` closure is an iteration too.

pub mod linear;
pub mod values;

pub use linear::{DeterminantMod, SolveMod};
pub use values::ExactValues;

use crate::field::PrimeField;
use crate::primes::UnusablePrimes;
use crate::rational::Rational;
use anyhow::{Context, Result};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pure, reentrant modular computation
pub trait Iteration: Send + Sync {
    /// Residue of the answer modulo `field.modulus()`
    fn evaluate(&self, field: &PrimeField) -> Result<Vec<u64>>;

    /// Primes at which `evaluate` is known to be undefined
    fn unusable(&self) -> UnusablePrimes {
        UnusablePrimes::none()
    }
}

impl<F> Iteration for F
where
    F: Fn(&PrimeField) -> Result<Vec<u64>> + Send + Sync,
{
    fn evaluate(&self, field: &PrimeField) -> Result<Vec<u64>> {
        self(field)
    }
}

/// Serializable description of the computation to run
///
/// Travels inside the job configuration so remote node services can rebuild
/// the same iteration locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Problem {
    /// Known integers or fractions (`"n"` or `"n/d"`)
    Values { values: Vec<String> },

    /// `det(matrix)`
    Determinant { matrix: Vec<Vec<i64>> },

    /// `x` with `matrix · x = rhs`
    Solve { matrix: Vec<Vec<i64>>, rhs: Vec<i64> },
}

impl Default for Problem {
    fn default() -> Self {
        Problem::Values { values: Vec::new() }
    }
}

impl Problem {
    /// Build the iteration this problem describes
    pub fn build(&self) -> Result<Arc<dyn Iteration>> {
        Ok(match self {
            Problem::Values { values } => {
                let parsed = values
                    .iter()
                    .map(|v| v.parse::<Rational>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to parse problem values")?;
                Arc::new(ExactValues::new(parsed))
            }
            Problem::Determinant { matrix } => Arc::new(DeterminantMod::new(matrix.clone())?),
            Problem::Solve { matrix, rhs } => Arc::new(SolveMod::new(matrix.clone(), rhs.clone())?),
        })
    }

    /// A multiple of every denominator of the answer, when one is known a priori
    pub fn denominator_hint(&self) -> Option<BigInt> {
        match self {
            Problem::Solve { matrix, .. } => Some(linear::exact_determinant(matrix)),
            _ => None,
        }
    }

    /// Short name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Problem::Values { .. } => "values",
            Problem::Determinant { .. } => "determinant",
            Problem::Solve { .. } => "solve",
        }
    }
}
