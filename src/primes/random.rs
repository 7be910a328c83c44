//! Random prime stream
//!
//! Uniformly random primes with an exact bit length, drawn from a seeded
//! xoshiro generator so a run can be replayed. The stream may repeat a prime;
//! callers are expected to filter repeats through their unusable predicate.

use super::{is_prime, PrimeSource};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Random `bits`-bit primes
#[derive(Debug, Clone)]
pub struct RandomPrimes {
    rng: Xoshiro256PlusPlus,
    bits: u32,
}

impl RandomPrimes {
    /// Create a stream of `bits`-bit primes
    ///
    /// `bits` is clamped to `3..=62`, the range a [`PrimeField`](crate::field::PrimeField)
    /// accepts.
    pub fn new(bits: u32, seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            bits: bits.clamp(3, 62),
        }
    }
}

impl PrimeSource for RandomPrimes {
    fn next_prime(&mut self) -> Option<u64> {
        let low = 1u64 << (self.bits - 1);
        let high = 1u64 << self.bits;
        loop {
            // Odd candidate in [2^(bits-1), 2^bits)
            let candidate = self.rng.gen_range(low..high) | 1;
            if is_prime(candidate) {
                return Some(candidate);
            }
        }
    }
}
