//! Prime sources
//!
//! A prime source is a forward-only stream of primes. Callers never use a
//! candidate blindly: every draw is filtered through an "unusable" predicate
//! (supplied by the reconstruction builder) and redrawn on rejection.
//!
//! # Sources
//!
//! - **Sequential**: consecutive primes walking down (or up) from a start value
//! - **Random**: uniformly random primes of a fixed bit length, seeded
//! - **Strided**: ascending primes dealt round-robin, disjoint per worker
//! - **Fixed**: an explicit list (replays and tests)
//!
//! # Assignment Policies
//!
//! With the centralized policy only the coordinator owns a source. With the
//! partitioned policy every worker owns an independent stream wrapped in a
//! [`LocalPrimeStream`], which remembers the primes that worker already used.
//!
//! # Example
//!
//! ```
//! use crtpool::primes::{PrimeSource, draw_usable, sequential::SequentialPrimes};
//!
//! let mut source = SequentialPrimes::descending(100);
//! assert_eq!(source.next_prime(), Some(97));
//!
//! // Skip primes the caller cannot use
//! let p = draw_usable(&mut source, |p| p % 10 == 9);
//! assert_eq!(p, Some(83));
//! ```

pub mod fixed;
pub mod local;
pub mod random;
pub mod sequential;
pub mod strided;

pub use local::LocalPrimeStream;

use fixed::FixedPrimes;
use num_bigint::BigInt;
use num_traits::Zero;
use random::RandomPrimes;
use sequential::SequentialPrimes;
use serde::{Deserialize, Serialize};
use strided::StridedPrimes;

/// Forward-only prime stream
///
/// `next_prime` advances and returns the next candidate in generation order,
/// or `None` once the stream is exhausted. Sources must be `Send` so a worker
/// task can own its stream.
pub trait PrimeSource: Send {
    fn next_prime(&mut self) -> Option<u64>;
}

impl<S: PrimeSource + ?Sized> PrimeSource for Box<S> {
    fn next_prime(&mut self) -> Option<u64> {
        (**self).next_prime()
    }
}

/// Every `stride`-th prime of an inner stream, starting at `offset`
///
/// Splits one stream into `stride` disjoint sub-streams.
#[derive(Debug, Clone)]
pub struct Interleave<S> {
    inner: S,
    skip: usize,
    stride: usize,
}

impl<S: PrimeSource> Interleave<S> {
    pub fn new(inner: S, offset: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        Self {
            inner,
            skip: offset % stride,
            stride,
        }
    }
}

impl<S: PrimeSource> PrimeSource for Interleave<S> {
    fn next_prime(&mut self) -> Option<u64> {
        for _ in 0..self.skip {
            self.inner.next_prime()?;
        }
        self.skip = self.stride - 1;
        self.inner.next_prime()
    }
}

/// Who draws primes during a distributed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PrimePolicy {
    /// The coordinator owns the only source and assigns every prime
    #[default]
    Centralized,
    /// Every worker owns an independent stream
    Partitioned,
}

/// Which generator backs a prime stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Sequential,
    Random,
    Strided,
    Fixed,
}

/// Prime stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimeConfig {
    pub policy: PrimePolicy,
    pub source: SourceKind,

    /// Bit length of generated primes (sequential walks down from `2^bits`)
    pub bits: u32,

    /// Seed of the random source; worker `i` of a partitioned run uses `seed + i`
    pub seed: u64,

    /// Explicit start value overriding the one derived from `bits`
    pub start: Option<u64>,

    /// Primes of the fixed source, in order
    pub list: Vec<u64>,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        Self {
            policy: PrimePolicy::Centralized,
            source: SourceKind::Sequential,
            bits: 31,
            seed: 0,
            start: None,
            list: Vec::new(),
        }
    }
}

impl PrimeConfig {
    /// The single stream of a sequential or centralized run
    pub fn central_source(&self) -> Box<dyn PrimeSource> {
        self.partition(0, 1)
    }

    /// Stream `index` of `count` disjoint worker streams
    ///
    /// Sequential, strided and fixed sources are dealt round-robin, so these
    /// partitions never overlap. Random streams
    /// are only seeded apart and may coincide.
    pub fn partition(&self, index: usize, count: usize) -> Box<dyn PrimeSource> {
        match self.source {
            SourceKind::Sequential => {
                let start = self.start.unwrap_or(1u64 << self.bits.min(62));
                Box::new(Interleave::new(SequentialPrimes::descending(start), index, count))
            }
            SourceKind::Random => Box::new(RandomPrimes::new(
                self.bits,
                self.seed.wrapping_add(index as u64),
            )),
            SourceKind::Strided => {
                let start = self.start.unwrap_or(1u64 << self.bits.saturating_sub(1).min(61));
                Box::new(StridedPrimes::new(index, count, start))
            }
            SourceKind::Fixed => Box::new(Interleave::new(FixedPrimes::new(self.list.clone()), index, count)),
        }
    }
}

/// Consecutive rejected candidates after which a draw gives up
///
/// Only a source that keeps repeating primes the caller cannot use (a random
/// stream whose bit length has run out of fresh primes) gets this far.
pub const MAX_CONSECUTIVE_REJECTIONS: usize = 10_000;

/// Draw the next candidate for which `is_unusable` is false
///
/// Returns `None` when the source is exhausted or after
/// [`MAX_CONSECUTIVE_REJECTIONS`] rejections in a row.
pub fn draw_usable<S, F>(source: &mut S, mut is_unusable: F) -> Option<u64>
where
    S: PrimeSource + ?Sized,
    F: FnMut(u64) -> bool,
{
    for _ in 0..MAX_CONSECUTIVE_REJECTIONS {
        let p = source.next_prime()?;
        if !is_unusable(p) {
            return Some(p);
        }
    }
    None
}

/// Static part of the unusable-prime predicate
///
/// Holds the algorithm-specific factor (for example a known denominator or
/// determinant) that primes must not divide. Workers in partitioned mode
/// receive this filter; the builder combines it with its own modulus check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusablePrimes {
    forbidden: Option<BigInt>,
}

impl UnusablePrimes {
    /// Filter rejecting nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Filter rejecting every prime dividing `factor`
    pub fn dividing(factor: BigInt) -> Self {
        Self { forbidden: Some(factor) }
    }

    /// Filter rejecting every prime either filter rejects
    pub fn and(self, other: UnusablePrimes) -> Self {
        match (self.forbidden, other.forbidden) {
            (Some(a), Some(b)) => Self::dividing(a * b),
            (a, b) => Self { forbidden: a.or(b) },
        }
    }

    /// Whether `p` divides the forbidden factor; 0 and 1 are never usable
    pub fn is_unusable(&self, p: u64) -> bool {
        if p < 2 {
            return true;
        }
        match &self.forbidden {
            Some(f) => (f % p).is_zero(),
            None => false,
        }
    }
}

/// Deterministic Miller-Rabin for 64-bit integers
///
/// The first twelve primes as witnesses are exact for every `n < 2^64`.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for &w in &WITNESSES {
        if n == w {
            return true;
        }
        if n % w == 0 {
            return false;
        }
    }

    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[inline]
fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_primes() {
        let primes: Vec<u64> = (0..50).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]);
    }

    #[test]
    fn test_large_primes_and_composites() {
        assert!(is_prime(1_000_000_007));
        assert!(is_prime((1u64 << 61) - 1));
        assert!(is_prime(4_611_686_018_427_387_847)); // largest prime below 2^62
        assert!(!is_prime(1_000_000_007 * 3));
        // Strong pseudoprime to bases 2, 3, 5, 7
        assert!(!is_prime(3_215_031_751));
        assert!(!is_prime(10007 * 10009));
    }

    #[test]
    fn test_unusable_filter() {
        let filter = UnusablePrimes::dividing(BigInt::from(10007u64 * 97));
        assert!(filter.is_unusable(97));
        assert!(filter.is_unusable(10007));
        assert!(!filter.is_unusable(10009));
        assert!(!UnusablePrimes::none().is_unusable(97));
        assert!(UnusablePrimes::none().is_unusable(0));
        assert!(filter.is_unusable(0));
        assert!(filter.is_unusable(1));

        let both = filter.and(UnusablePrimes::dividing(BigInt::from(13)));
        assert!(both.is_unusable(13));
        assert!(both.is_unusable(97));
        assert_eq!(UnusablePrimes::none().and(UnusablePrimes::none()), UnusablePrimes::none());
    }

    #[test]
    fn test_interleave_partitions_stream() {
        let take = |offset| {
            let mut s = Interleave::new(FixedPrimes::new(vec![3, 5, 7, 11, 13, 17, 19]), offset, 3);
            std::iter::from_fn(move || s.next_prime()).collect::<Vec<_>>()
        };
        assert_eq!(take(0), vec![3, 11, 19]);
        assert_eq!(take(1), vec![5, 13]);
        assert_eq!(take(2), vec![7, 17]);
    }

    #[test]
    fn test_default_config_walks_down_from_31_bits() {
        let mut source = PrimeConfig::default().central_source();
        assert_eq!(source.next_prime(), Some((1 << 31) - 1));
    }

    #[test]
    fn test_partitions_are_disjoint() {
        for kind in [SourceKind::Sequential, SourceKind::Strided] {
            let config = PrimeConfig {
                source: kind,
                bits: 20,
                ..PrimeConfig::default()
            };
            for count in [3, 4, 6] {
                let mut seen = std::collections::HashSet::new();
                for index in 0..count {
                    let mut source = config.partition(index, count);
                    for _ in 0..20 {
                        assert!(seen.insert(source.next_prime().unwrap()), "{:?} overlaps", kind);
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_toml() {
        let config: PrimeConfig = toml::from_str(
            r#"
            policy = "partitioned"
            source = "fixed"
            list = [10007, 10009]
            "#,
        )
        .unwrap();
        assert_eq!(config.policy, PrimePolicy::Partitioned);
        assert_eq!(config.bits, 31);
        assert_eq!(config.partition(1, 2).next_prime(), Some(10009));
    }

    #[test]
    fn test_draw_usable_exhausts() {
        let mut source = fixed::FixedPrimes::new(vec![3, 5, 7]);
        assert_eq!(draw_usable(&mut source, |p| p != 7), Some(7));
        assert_eq!(draw_usable(&mut source, |_| false), None);
    }

    #[test]
    fn test_draw_usable_gives_up_on_repeating_source() {
        // 5 and 7 are the only 3-bit primes
        let mut source = RandomPrimes::new(3, 0);
        let mut used = std::collections::HashSet::new();
        while let Some(p) = draw_usable(&mut source, |p| used.contains(&p)) {
            used.insert(p);
        }
        assert_eq!(used, [5, 7].into_iter().collect());
    }
}
