//! Fixed prime list
//!
//! Replays an explicit sequence of primes. Used to pin the exact primes of a run.

use super::PrimeSource;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct FixedPrimes {
    primes: VecDeque<u64>,
}

impl FixedPrimes {
    pub fn new(primes: Vec<u64>) -> Self {
        Self {
            primes: primes.into(),
        }
    }
}

impl PrimeSource for FixedPrimes {
    fn next_prime(&mut self) -> Option<u64> {
        self.primes.pop_front()
    }
}
