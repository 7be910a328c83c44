//! Rational CRA strategies
//!
//! [`RationalCra`] recovers each element as a fraction by rational
//! reconstruction against `M`. [`HintedRationalCra`] is given a multiple of
//! every denominator up front (for a linear solve, `det(A)`), so it lifts the
//! integer numerators `hint·x` instead and divides at the end.

use super::crt::CrtAccumulator;
use super::integer::IntegerCra;
use super::termination::{StabilityCounter, TerminationPolicy};
use super::{Reconstructed, ReconstructionBuilder};
use crate::error::ReconstructionError;
use crate::field::PrimeField;
use crate::rational::{reconstruct, Rational};
use num_bigint::BigInt;
use num_traits::Zero;

#[derive(Debug, Clone)]
pub struct RationalCra {
    policy: TerminationPolicy,
    acc: Option<CrtAccumulator>,
    /// Per-element fraction, `None` where reconstruction last failed
    candidate: Vec<Option<Rational>>,
    stability: StabilityCounter,
}

impl RationalCra {
    pub fn new(policy: TerminationPolicy) -> Self {
        Self {
            policy,
            acc: None,
            candidate: Vec::new(),
            stability: StabilityCounter::default(),
        }
    }

    pub fn streak(&self) -> usize {
        self.stability.streak()
    }
}

fn agrees(candidate: &Option<Rational>, field: &PrimeField, r: u64) -> bool {
    match candidate {
        Some(q) => field.reduce_fraction(q.numerator(), q.denominator()) == Some(r),
        None => false,
    }
}

impl ReconstructionBuilder for RationalCra {
    fn initialize(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        if self.acc.is_some() {
            return Err(ReconstructionError::AlreadyInitialized);
        }
        let acc = CrtAccumulator::start(prime, residue)?;
        self.candidate = acc
            .values()
            .iter()
            .map(|v| reconstruct(v, acc.modulus()))
            .collect();
        self.stability = StabilityCounter::default();
        self.acc = Some(acc);
        Ok(())
    }

    fn progress(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        let acc = self.acc.as_mut().ok_or(ReconstructionError::NotInitialized)?;
        let field = PrimeField::new(prime)?;

        let agreement: Vec<bool> = self
            .candidate
            .iter()
            .zip(residue)
            .map(|(q, &r)| agrees(q, &field, r))
            .collect();

        acc.merge(prime, residue)?;

        for (i, agreed) in agreement.iter().enumerate() {
            if !agreed {
                self.candidate[i] = reconstruct(&acc.values()[i], acc.modulus());
            }
        }
        self.stability.record(agreement.iter().all(|&a| a));
        Ok(())
    }

    fn terminated(&self) -> bool {
        self.acc
            .as_ref()
            .is_some_and(|acc| self.policy.is_satisfied(self.stability.streak(), acc.modulus()))
    }

    fn result(&self) -> Result<Reconstructed, ReconstructionError> {
        let acc = self.acc.as_ref().ok_or(ReconstructionError::NotInitialized)?;
        let values = acc
            .values()
            .iter()
            .enumerate()
            .map(|(index, v)| {
                reconstruct(v, acc.modulus())
                    .ok_or(ReconstructionError::RationalReconstruction { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reconstructed::Rational(values))
    }

    fn is_unusable(&self, prime: u64) -> bool {
        self.acc.as_ref().is_some_and(|acc| acc.contains(prime))
    }

    fn accumulator(&self) -> Option<&CrtAccumulator> {
        self.acc.as_ref()
    }
}

/// Rational CRA with a known denominator multiple
#[derive(Debug, Clone)]
pub struct HintedRationalCra {
    hint: BigInt,
    inner: IntegerCra,
}

impl HintedRationalCra {
    pub fn new(hint: BigInt, policy: TerminationPolicy) -> Result<Self, ReconstructionError> {
        if hint.is_zero() {
            return Err(ReconstructionError::MissingHint);
        }
        Ok(Self {
            hint,
            inner: IntegerCra::new(policy),
        })
    }

    pub fn hint(&self) -> &BigInt {
        &self.hint
    }

    /// Residues of `hint·x` from residues of `x`
    fn scale(&self, prime: u64, residue: &[u64]) -> Result<Vec<u64>, ReconstructionError> {
        let field = PrimeField::new(prime)?;
        let h = field.reduce_bigint(&self.hint);
        if h == 0 {
            return Err(ReconstructionError::HintDivisible { modulus: prime });
        }
        residue
            .iter()
            .map(|&r| {
                if r >= prime {
                    Err(ReconstructionError::ResidueOutOfRange {
                        modulus: prime,
                        value: r,
                    })
                } else {
                    Ok(field.mul(r, h))
                }
            })
            .collect()
    }
}

impl ReconstructionBuilder for HintedRationalCra {
    fn initialize(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        if self.inner.is_initialized() {
            return Err(ReconstructionError::AlreadyInitialized);
        }
        let scaled = self.scale(prime, residue)?;
        self.inner.initialize(prime, &scaled)
    }

    fn progress(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        if !self.inner.is_initialized() {
            return Err(ReconstructionError::NotInitialized);
        }
        let scaled = self.scale(prime, residue)?;
        self.inner.progress(prime, &scaled)
    }

    fn terminated(&self) -> bool {
        self.inner.terminated()
    }

    fn result(&self) -> Result<Reconstructed, ReconstructionError> {
        match self.inner.result()? {
            Reconstructed::Integer(numerators) => Ok(Reconstructed::Rational(
                numerators
                    .into_iter()
                    .map(|n| Rational::new(n, self.hint.clone()))
                    .collect(),
            )),
            other => Ok(other),
        }
    }

    fn is_unusable(&self, prime: u64) -> bool {
        prime < 2 || (&self.hint % prime).is_zero() || self.inner.is_unusable(prime)
    }

    fn accumulator(&self) -> Option<&CrtAccumulator> {
        self.inner.accumulator()
    }
}
