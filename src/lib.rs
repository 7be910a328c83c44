//! crtpool - distributed incremental Chinese remaindering
//!
//! Recovers exact integer or rational results of a computation from its
//! residues modulo many primes. Workers evaluate the computation at one
//! prime each while a coordinator merges residues in whatever order they
//! arrive, until a termination heuristic declares the result stable.
//!
//! # Architecture
//!
//! - **Builders**: incremental CRT merge with integer, rational and hinted-rational results
//! - **Prime sources**: sequential, random, strided and fixed streams
//! - **Distributed mode**: coordinator and workers over in-process channels or TCP
//! - **Sequential fallback**: the same builder without messaging

pub mod builder;
pub mod config;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod field;
pub mod iteration;
pub mod output;
pub mod primes;
pub mod rational;
pub mod sequential;
pub mod stats;

// Re-export commonly used types
pub use builder::{new_builder, BuilderKind, Reconstructed, ReconstructionBuilder, TerminationPolicy};
pub use config::JobConfig;
pub use engine::{PreparedJob, Reconstructor};
pub use error::ReconstructionError;
pub use field::PrimeField;
pub use iteration::Iteration;
pub use rational::Rational;
pub use stats::Outcome;

/// Result type used throughout crtpool
pub type Result<T> = anyhow::Result<T>;
