//! Configuration validation

use super::*;
use crate::builder::BuilderKind;
use crate::distributed::WorkerMode;
use crate::field::MAX_MODULUS;
use crate::iteration::Problem;
use crate::primes::{is_prime, PrimePolicy, SourceKind};
use crate::rational::Rational;
use anyhow::{Context, Result};
use num_bigint::BigInt;
use num_traits::Zero;

/// Validate complete configuration
pub fn validate_config(config: &JobConfig) -> Result<()> {
    validate_problem(&config.problem)?;
    validate_reconstruction(&config.reconstruction, &config.problem)?;
    validate_primes(&config.primes)?;
    validate_workers(&config.workers, config.primes.policy)?;

    Ok(())
}

/// Validate the problem description
pub fn validate_problem(problem: &Problem) -> Result<()> {
    match problem {
        Problem::Values { values } => {
            if values.is_empty() {
                anyhow::bail!("problem has no values to reconstruct");
            }
            for (i, v) in values.iter().enumerate() {
                v.parse::<Rational>()
                    .with_context(|| format!("problem value {} is not an integer or fraction", i))?;
            }
        }
        Problem::Determinant { matrix } => {
            validate_square(matrix)?;
        }
        Problem::Solve { matrix, rhs } => {
            let n = validate_square(matrix)?;
            if n == 0 {
                anyhow::bail!("solve needs a non-empty matrix");
            }
            if rhs.len() != n {
                anyhow::bail!("rhs has {} entries but the matrix is {}x{}", rhs.len(), n, n);
            }
        }
    }
    Ok(())
}

fn validate_square(matrix: &[Vec<i64>]) -> Result<usize> {
    let n = matrix.len();
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != n {
            anyhow::bail!("matrix row {} has {} entries, expected {}", i, row.len(), n);
        }
    }
    Ok(n)
}

/// Validate strategy, hint and termination
pub fn validate_reconstruction(reconstruction: &ReconstructionConfig, problem: &Problem) -> Result<()> {
    let termination = &reconstruction.termination;
    if !termination.is_enabled() {
        anyhow::bail!("at least one termination condition (stability_threshold or bound_bits) is required");
    }
    if termination.stability_threshold == Some(0) {
        anyhow::bail!("stability_threshold must be at least 1");
    }

    if let Some(ref hint) = reconstruction.hint {
        let value: BigInt = hint
            .trim()
            .parse()
            .with_context(|| format!("hint {:?} is not an integer", hint))?;
        if value.is_zero() {
            anyhow::bail!("hint must be nonzero");
        }
    }

    if reconstruction.builder == BuilderKind::HintedRational
        && reconstruction.hint.is_none()
        && problem.denominator_hint().is_none()
    {
        anyhow::bail!("hinted-rational needs a hint, or a solve problem to derive one from");
    }
    Ok(())
}

/// Validate prime generation
pub fn validate_primes(primes: &PrimeConfig) -> Result<()> {
    if !(3..=62).contains(&primes.bits) {
        anyhow::bail!("prime bits must be between 3 and 62, got {}", primes.bits);
    }
    if let Some(start) = primes.start {
        if start >= MAX_MODULUS {
            anyhow::bail!("prime start {} is not below 2^62", start);
        }
    }
    if primes.source == SourceKind::Fixed && primes.list.is_empty() {
        anyhow::bail!("the fixed prime source needs a non-empty list");
    }
    if let Some(&bad) = primes.list.iter().find(|&&p| p < 3 || p >= MAX_MODULUS || !is_prime(p)) {
        anyhow::bail!("prime list entry {} is not a prime in [3, 2^62)", bad);
    }
    Ok(())
}

/// Validate the worker pool
pub fn validate_workers(workers: &WorkersConfig, policy: PrimePolicy) -> Result<()> {
    if workers.participants == 0 {
        anyhow::bail!("participants must be at least 1");
    }
    if workers.mode == WorkerMode::Polling && policy != PrimePolicy::Partitioned {
        anyhow::bail!("polling workers draw their own primes; use the partitioned policy");
    }
    Ok(())
}
