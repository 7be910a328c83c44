//! Reconstruction builders
//!
//! A builder consumes `(prime, residue)` pairs one at a time and maintains the
//! running Chinese Remainder reconstruction. The coordinator (or the sequential
//! driver) owns exactly one builder per run.
//!
//! # Contract
//!
//! - `initialize` exactly once, then any number of `progress` calls
//! - `progress` requires the prime to be coprime to the accumulated modulus
//! - `terminated` is false until the builder has been initialized
//! - `result` is idempotent
//!
//! # Strategies
//!
//! | Kind | Result |
//! |---|---|
//! | [`IntegerCra`] | signed integers |
//! | [`RationalCra`] | fractions by rational reconstruction |
//! | [`HintedRationalCra`] | fractions over a known denominator multiple |

pub mod crt;
pub mod integer;
pub mod rational;
pub mod termination;

pub use crt::CrtAccumulator;
pub use integer::IntegerCra;
pub use rational::{HintedRationalCra, RationalCra};
pub use termination::TerminationPolicy;

use crate::error::ReconstructionError;
use crate::rational::Rational;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability interface of a reconstruction strategy
pub trait ReconstructionBuilder: Send {
    /// Seed the reconstruction with its first pair
    fn initialize(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError>;

    /// Merge one more pair
    fn progress(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError>;

    /// Heuristic stop decision
    fn terminated(&self) -> bool;

    /// Externally meaningful value of the current reconstruction
    fn result(&self) -> Result<Reconstructed, ReconstructionError>;

    /// Whether `prime` must be skipped before it is assigned
    fn is_unusable(&self, prime: u64) -> bool;

    /// Underlying `(M, V)` state, `None` before `initialize`
    fn accumulator(&self) -> Option<&CrtAccumulator>;

    fn is_initialized(&self) -> bool {
        self.accumulator().is_some()
    }

    /// `initialize` on the first call, `progress` afterwards
    fn absorb(&mut self, prime: u64, residue: &[u64]) -> Result<(), ReconstructionError> {
        if self.is_initialized() {
            self.progress(prime, residue)
        } else {
            self.initialize(prime, residue)
        }
    }

    /// Bit length of the accumulated modulus, 0 before `initialize`
    fn modulus_bits(&self) -> u64 {
        self.accumulator().map_or(0, |acc| acc.modulus().bits())
    }
}

/// Final value of a reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconstructed {
    Integer(Vec<BigInt>),
    Rational(Vec<Rational>),
}

impl Reconstructed {
    pub fn len(&self) -> usize {
        match self {
            Reconstructed::Integer(v) => v.len(),
            Reconstructed::Rational(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as decimal strings (`"n"` or `"n/d"`)
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Reconstructed::Integer(v) => v.iter().map(|n| n.to_string()).collect(),
            Reconstructed::Rational(v) => v.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reconstructed::Integer(_) => "integer",
            Reconstructed::Rational(_) => "rational",
        }
    }
}

impl fmt::Display for Reconstructed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.to_strings();
        if parts.len() == 1 {
            write!(f, "{}", parts[0])
        } else {
            write!(f, "[{}]", parts.join(", "))
        }
    }
}

/// Strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderKind {
    #[default]
    Integer,
    Rational,
    HintedRational,
}

/// Create the builder selected by `kind`
///
/// `hint` is required by, and only used for, [`BuilderKind::HintedRational`].
pub fn new_builder(
    kind: BuilderKind,
    policy: TerminationPolicy,
    hint: Option<BigInt>,
) -> Result<Box<dyn ReconstructionBuilder>, ReconstructionError> {
    Ok(match kind {
        BuilderKind::Integer => Box::new(IntegerCra::new(policy)),
        BuilderKind::Rational => Box::new(RationalCra::new(policy)),
        BuilderKind::HintedRational => {
            let hint = hint.ok_or(ReconstructionError::MissingHint)?;
            Box::new(HintedRationalCra::new(hint, policy)?)
        }
    })
}
