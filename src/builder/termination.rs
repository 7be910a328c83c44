//! Termination heuristics
//!
//! Two conditions, either of which ends prime collection:
//!
//! - **Stability**: the candidate reconstruction already agreed with the last
//!   `K` merged residues. Early termination, a heuristic rather than a proof.
//! - **Bound**: the accumulated modulus exceeds twice an a-priori bound on the
//!   magnitude of the answer, `M > 2·2^bound_bits`. Provably sufficient for
//!   the integer strategy.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Consecutive agreeing merges required by the default policy
pub const DEFAULT_STABILITY_THRESHOLD: usize = 4;

/// When the builder may stop collecting primes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationPolicy {
    /// Required run of agreeing merges (`K`), `None` disables the check
    pub stability_threshold: Option<usize>,

    /// Bit length bounding `|answer|`, `None` disables the check
    pub bound_bits: Option<u64>,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            stability_threshold: Some(DEFAULT_STABILITY_THRESHOLD),
            bound_bits: None,
        }
    }
}

impl TerminationPolicy {
    /// Stop after `k` agreeing merges only
    pub fn stability(k: usize) -> Self {
        Self {
            stability_threshold: Some(k),
            bound_bits: None,
        }
    }

    /// Stop once the modulus is large enough for a `bits`-bit answer
    pub fn bound(bits: u64) -> Self {
        Self {
            stability_threshold: None,
            bound_bits: Some(bits),
        }
    }

    /// Whether any condition is configured at all
    pub fn is_enabled(&self) -> bool {
        self.stability_threshold.is_some() || self.bound_bits.is_some()
    }

    /// Evaluate both conditions for the current state
    pub fn is_satisfied(&self, streak: usize, modulus: &BigInt) -> bool {
        let stable = self.stability_threshold.is_some_and(|k| streak >= k);
        let bounded = self.bound_bits.is_some_and(|b| modulus.bits() > b + 1);
        stable || bounded
    }
}

/// Run of consecutive merges the candidate survived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityCounter {
    streak: usize,
}

impl StabilityCounter {
    pub fn record(&mut self, agreed: bool) {
        if agreed {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
    }

    pub fn streak(&self) -> usize {
        self.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.stability_threshold, Some(4));
        assert!(policy.bound_bits.is_none());
        assert!(policy.is_enabled());
    }

    #[test]
    fn test_stability_condition() {
        let policy = TerminationPolicy::stability(3);
        let m = BigInt::from(1u64 << 40);
        assert!(!policy.is_satisfied(2, &m));
        assert!(policy.is_satisfied(3, &m));
    }

    #[test]
    fn test_bound_condition() {
        // M > 2 * 2^10 needs at least 12 bits
        let policy = TerminationPolicy::bound(10);
        assert!(!policy.is_satisfied(100, &BigInt::from(2047)));
        assert!(policy.is_satisfied(0, &BigInt::from(2048)));
    }

    #[test]
    fn test_counter_resets() {
        let mut counter = StabilityCounter::default();
        counter.record(true);
        counter.record(true);
        assert_eq!(counter.streak(), 2);
        counter.record(false);
        assert_eq!(counter.streak(), 0);
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: TerminationPolicy = toml::from_str("bound_bits = 64").unwrap();
        // Unset fields fall back to the default policy
        assert_eq!(policy.stability_threshold, Some(4));
        assert_eq!(policy.bound_bits, Some(64));

        let disabled: TerminationPolicy = toml::from_str("stability_threshold = 2").unwrap();
        assert_eq!(disabled.stability_threshold, Some(2));
    }
}
