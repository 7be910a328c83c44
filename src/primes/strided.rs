//! Strided prime stream
//!
//! Walks the primes at or above a start value in increasing order and deals
//! them round-robin across `stride` streams: stream `index` yields the primes
//! of rank `index`, `index + stride`, `index + 2·stride`, ...
//!
//! Dealing by rank rather than by candidate residue class keeps every stream
//! non-empty for any stride. Two strided streams with the same `start` and
//! `stride` but different `index` never produce the same prime, so
//! partitioned workers using this stream need no cross-worker coordination.

use super::sequential::SequentialPrimes;
use super::{Interleave, PrimeSource};

#[derive(Debug, Clone)]
pub struct StridedPrimes {
    inner: Interleave<SequentialPrimes>,
}

impl StridedPrimes {
    /// Stream `index` of `stride` disjoint streams of primes from `start`
    ///
    /// Starts below 3 are raised to 3.
    pub fn new(index: usize, stride: usize, start: u64) -> Self {
        Self {
            inner: Interleave::new(SequentialPrimes::ascending(start.max(3)), index, stride),
        }
    }
}

impl PrimeSource for StridedPrimes {
    fn next_prime(&mut self) -> Option<u64> {
        self.inner.next_prime()
    }
}
