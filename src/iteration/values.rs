//! Known values reduced modulo p

use super::Iteration;
use crate::field::PrimeField;
use crate::primes::UnusablePrimes;
use crate::rational::Rational;
use anyhow::{anyhow, Result};
use num_bigint::BigInt;
use num_traits::One;

/// Reduces a fixed vector of rationals modulo every prime
///
/// Reconstructing these values back is the end-to-end check of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactValues {
    values: Vec<Rational>,
}

impl ExactValues {
    pub fn new(values: Vec<Rational>) -> Self {
        Self { values }
    }

    pub fn from_integers<I: IntoIterator<Item = i64>>(values: I) -> Self {
        Self::new(values.into_iter().map(Rational::from).collect())
    }

    pub fn values(&self) -> &[Rational] {
        &self.values
    }
}

impl Iteration for ExactValues {
    fn evaluate(&self, field: &PrimeField) -> Result<Vec<u64>> {
        self.values
            .iter()
            .map(|q| {
                field
                    .reduce_fraction(q.numerator(), q.denominator())
                    .ok_or_else(|| anyhow!("{} is undefined modulo {}", q, field.modulus()))
            })
            .collect()
    }

    fn unusable(&self) -> UnusablePrimes {
        let product: BigInt = self.values.iter().map(|q| q.denominator().clone()).product();
        if product.is_one() {
            UnusablePrimes::none()
        } else {
            UnusablePrimes::dividing(product)
        }
    }
}
