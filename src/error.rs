//! Reconstruction errors
//!
//! Contract violations raised by a [`ReconstructionBuilder`](crate::builder::ReconstructionBuilder).
//! None of these are recoverable: the orchestration layers wrap them in
//! `anyhow::Error` and abort the run.

use thiserror::Error;

/// Errors raised by the reconstruction builders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructionError {
    /// `progress` received a modulus sharing a factor with the accumulated modulus
    #[error("modulus {modulus} is not coprime to the accumulated modulus")]
    NonCoprime { modulus: u64 },

    /// `progress` or `result` called before `initialize`
    #[error("builder has not been initialized")]
    NotInitialized,

    /// `initialize` called twice
    #[error("builder is already initialized")]
    AlreadyInitialized,

    /// Residue vector length differs from the one seen at `initialize`
    #[error("residue has {got} entries, expected {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Residue element not reduced modulo its prime
    #[error("residue value {value} is out of range for modulus {modulus}")]
    ResidueOutOfRange { modulus: u64, value: u64 },

    /// Modulus unusable as a field characteristic
    #[error("invalid modulus {0}")]
    InvalidModulus(u64),

    /// Modulus divides the configured denominator hint
    #[error("modulus {modulus} divides the denominator hint")]
    HintDivisible { modulus: u64 },

    /// Hinted reconstruction configured without a usable hint
    #[error("hinted rational reconstruction requires a nonzero hint")]
    MissingHint,

    /// No fraction within the reconstruction bounds exists for an element
    #[error("rational reconstruction failed for element {index}")]
    RationalReconstruction { index: usize },
}
