//! Sequential prime stream
//!
//! Walks consecutive primes from a start value, downwards by default. Walking
//! down from just below a word-size limit keeps every prime as large as possible,
//! which minimizes the number of primes a reconstruction needs.

use super::{is_prime, PrimeSource};

/// Consecutive primes starting from a bound
#[derive(Debug, Clone)]
pub struct SequentialPrimes {
    /// Next candidate to test
    cursor: u64,

    /// Walk direction
    descending: bool,

    /// Set once the walk falls off either end
    exhausted: bool,
}

impl SequentialPrimes {
    /// Primes strictly below `start`, largest first
    pub fn descending(start: u64) -> Self {
        Self {
            cursor: start.saturating_sub(1),
            descending: true,
            exhausted: false,
        }
    }

    /// Primes at or above `start`, smallest first
    pub fn ascending(start: u64) -> Self {
        Self {
            cursor: start,
            descending: false,
            exhausted: false,
        }
    }
}

impl PrimeSource for SequentialPrimes {
    fn next_prime(&mut self) -> Option<u64> {
        while !self.exhausted {
            let candidate = self.cursor;
            if self.descending {
                // The field needs p >= 3, so stop before 2
                if candidate < 3 {
                    self.exhausted = true;
                    return None;
                }
                self.cursor -= 1;
            } else {
                match self.cursor.checked_add(1) {
                    Some(next) => self.cursor = next,
                    None => self.exhausted = true,
                }
            }

            if candidate >= 3 && is_prime(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_from_31_bits() {
        let mut source = SequentialPrimes::descending(1 << 31);
        // 2^31 - 1 is prime
        assert_eq!(source.next_prime(), Some((1 << 31) - 1));
        let next = source.next_prime().unwrap();
        assert!(next < (1 << 31) - 1);
        assert!(is_prime(next));
    }

    #[test]
    fn test_descending_exhausts_at_three() {
        let mut source = SequentialPrimes::descending(12);
        let primes: Vec<u64> = std::iter::from_fn(|| source.next_prime()).collect();
        assert_eq!(primes, vec![11, 7, 5, 3]);
    }

    #[test]
    fn test_ascending() {
        let mut source = SequentialPrimes::ascending(10000);
        assert_eq!(source.next_prime(), Some(10007));
        assert_eq!(source.next_prime(), Some(10009));
        assert_eq!(source.next_prime(), Some(10037));
    }
}
