//! Chinese Remainder accumulator
//!
//! Holds the running pair `(M, V)`: `M` is the product of every merged modulus
//! and each element of `V` is the unique representative in `[0, M)` congruent
//! to the merged residues. Merging uses the single-step Garner update
//!
//! ```text
//! V' = V + M * ((r - V) * M^-1 mod p)
//! ```
//!
//! which yields the unique representative in `[0, M·p)`. Because that
//! representative is unique, the final `(M, V)` does not depend on the order
//! in which the pairs arrive.

use crate::error::ReconstructionError;
use crate::field::PrimeField;
use num_bigint::BigInt;
use num_traits::Zero;
use rayon::prelude::*;

/// Vector length above which elementwise merges run on the rayon pool
const PARALLEL_MERGE_THRESHOLD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtAccumulator {
    modulus: BigInt,
    values: Vec<BigInt>,
    merged: usize,
}

impl CrtAccumulator {
    /// Seed the accumulator with its first `(p, residue)` pair
    pub fn start(prime: u64, residue: &[u64]) -> Result<Self, ReconstructionError> {
        check_range(&PrimeField::new(prime)?, residue)?;
        Ok(Self {
            modulus: BigInt::from(prime),
            values: residue.iter().map(|&r| BigInt::from(r)).collect(),
            merged: 1,
        })
    }

    /// Merge `(p, residue)` into the running reconstruction
    ///
    /// Fails with [`ReconstructionError::NonCoprime`] when `p` shares a factor
    /// with `M`; the accumulator is left untouched on any error.
    pub fn merge(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        let field = PrimeField::new(prime)?;
        if residue.len() != self.values.len() {
            return Err(ReconstructionError::ShapeMismatch {
                expected: self.values.len(),
                got: residue.len(),
            });
        }
        check_range(&field, residue)?;

        let m_inv = field
            .inv(field.reduce_bigint(&self.modulus))
            .ok_or(ReconstructionError::NonCoprime { modulus: prime })?;

        let modulus = &self.modulus;
        if self.values.len() >= PARALLEL_MERGE_THRESHOLD {
            self.values
                .par_iter_mut()
                .zip(residue.par_iter())
                .for_each(|(v, &r)| lift(v, r, modulus, m_inv, &field));
        } else {
            for (v, &r) in self.values.iter_mut().zip(residue) {
                lift(v, r, modulus, m_inv, &field);
            }
        }

        self.modulus *= prime;
        self.merged += 1;
        Ok(())
    }

    /// Accumulated modulus `M`
    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    /// Representatives in `[0, M)`
    pub fn values(&self) -> &[BigInt] {
        &self.values
    }

    /// Number of moduli merged, including the seed
    pub fn merged(&self) -> usize {
        self.merged
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when `p` divides `M`
    pub fn contains(&self, prime: u64) -> bool {
        prime > 1 && (&self.modulus % prime).is_zero()
    }
}

fn check_range(field: &PrimeField, residue: &[u64]) -> Result<(), ReconstructionError> {
    let p = field.modulus();
    match residue.iter().find(|&&r| r >= p) {
        Some(&value) => Err(ReconstructionError::ResidueOutOfRange { modulus: p, value }),
        None => Ok(()),
    }
}

#[inline]
fn lift(v: &mut BigInt, r: u64, modulus: &BigInt, m_inv: u64, field: &PrimeField) {
    let t = field.mul(field.sub(r, field.reduce_bigint(v)), m_inv);
    if t != 0 {
        *v += modulus * t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: u64 = 123_456_789;

    #[test]
    fn test_merge_scalar() {
        let mut acc = CrtAccumulator::start(10007, &[X % 10007]).unwrap();
        acc.merge(10009, &[X % 10009]).unwrap();
        acc.merge(10037, &[X % 10037]).unwrap();
        assert_eq!(acc.values(), &[BigInt::from(X)]);
        assert_eq!(acc.modulus(), &BigInt::from(10007u64 * 10009 * 10037));
        assert_eq!(acc.merged(), 3);
    }

    #[test]
    fn test_merge_rejects_shared_factor() {
        let mut acc = CrtAccumulator::start(10007, &[1]).unwrap();
        let before = acc.clone();
        assert_eq!(
            acc.merge(10007, &[1]),
            Err(ReconstructionError::NonCoprime { modulus: 10007 })
        );
        assert_eq!(acc, before);
    }

    #[test]
    fn test_merge_rejects_bad_shapes_and_ranges() {
        let mut acc = CrtAccumulator::start(101, &[1, 2]).unwrap();
        assert_eq!(
            acc.merge(103, &[1]),
            Err(ReconstructionError::ShapeMismatch { expected: 2, got: 1 })
        );
        assert_eq!(
            acc.merge(103, &[1, 103]),
            Err(ReconstructionError::ResidueOutOfRange { modulus: 103, value: 103 })
        );
        assert!(CrtAccumulator::start(2, &[1]).is_err());
    }

    #[test]
    fn test_parallel_merge_matches_serial() {
        let truth: Vec<u64> = (0..200u64).map(|i| i * 7_919 + 13).collect();
        let residues = |p: u64| truth.iter().map(|v| v % p).collect::<Vec<_>>();

        let mut acc = CrtAccumulator::start(1_000_003, &residues(1_000_003)).unwrap();
        acc.merge(1_000_033, &residues(1_000_033)).unwrap();
        let expected: Vec<BigInt> = truth.iter().map(|&v| BigInt::from(v)).collect();
        assert_eq!(acc.values(), expected.as_slice());
    }

    #[test]
    fn test_contains() {
        let mut acc = CrtAccumulator::start(10007, &[0]).unwrap();
        acc.merge(10009, &[0]).unwrap();
        assert!(acc.contains(10007));
        assert!(acc.contains(10009));
        assert!(!acc.contains(10037));
    }
}
