//! Integer CRA
//!
//! Reconstructs signed integers: the answer is the symmetric representative
//! of `V` in `(-M/2, M/2]`.

use super::crt::CrtAccumulator;
use super::termination::{StabilityCounter, TerminationPolicy};
use super::{Reconstructed, ReconstructionBuilder};
use crate::error::ReconstructionError;
use crate::field::PrimeField;
use crate::rational::symmetric;
use num_bigint::BigInt;

#[derive(Debug, Clone)]
pub struct IntegerCra {
    policy: TerminationPolicy,
    acc: Option<CrtAccumulator>,
    /// Signed representatives as of the last disagreement
    candidate: Vec<BigInt>,
    stability: StabilityCounter,
}

impl IntegerCra {
    pub fn new(policy: TerminationPolicy) -> Self {
        Self {
            policy,
            acc: None,
            candidate: Vec::new(),
            stability: StabilityCounter::default(),
        }
    }

    /// Current run of agreeing merges
    pub fn streak(&self) -> usize {
        self.stability.streak()
    }

    fn signed_values(acc: &CrtAccumulator) -> Vec<BigInt> {
        acc.values()
            .iter()
            .map(|v| symmetric(v, acc.modulus()))
            .collect()
    }
}

impl ReconstructionBuilder for IntegerCra {
    fn initialize(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        if self.acc.is_some() {
            return Err(ReconstructionError::AlreadyInitialized);
        }
        let acc = CrtAccumulator::start(prime, residue)?;
        self.candidate = Self::signed_values(&acc);
        self.stability = StabilityCounter::default();
        self.acc = Some(acc);
        Ok(())
    }

    fn progress(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        let acc = self.acc.as_mut().ok_or(ReconstructionError::NotInitialized)?;
        let field = PrimeField::new(prime)?;

        // A candidate below M/2 in magnitude that matches r stays the symmetric
        // representative of the merged value, so only a mismatch refreshes it
        let agreed = self.candidate.len() == residue.len()
            && self
                .candidate
                .iter()
                .zip(residue)
                .all(|(s, &r)| field.reduce_bigint(s) == r);

        acc.merge(prime, residue)?;
        if !agreed {
            self.candidate = Self::signed_values(acc);
        }
        self.stability.record(agreed);
        Ok(())
    }

    fn terminated(&self) -> bool {
        self.acc
            .as_ref()
            .is_some_and(|acc| self.policy.is_satisfied(self.stability.streak(), acc.modulus()))
    }

    fn result(&self) -> Result<Reconstructed, ReconstructionError> {
        let acc = self.acc.as_ref().ok_or(ReconstructionError::NotInitialized)?;
        Ok(Reconstructed::Integer(Self::signed_values(acc)))
    }

    fn is_unusable(&self, prime: u64) -> bool {
        self.acc.as_ref().is_some_and(|acc| acc.contains(prime))
    }

    fn accumulator(&self) -> Option<&CrtAccumulator> {
        self.acc.as_ref()
    }
}
