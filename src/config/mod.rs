//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! A [`JobConfig`] is also what the coordinator ships to remote node services,
//! so every field is serializable.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::builder::{BuilderKind, TerminationPolicy};
use crate::distributed::WorkerMode;
use crate::iteration::Problem;
use crate::primes::PrimeConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Complete job configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub problem: Problem,
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,
    #[serde(default)]
    pub primes: PrimeConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub distributed: DistributedConfig,
}

/// Strategy and stopping rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    #[serde(default)]
    pub builder: BuilderKind,
    /// Denominator multiple for the hinted rational builder, as a decimal integer
    ///
    /// When unset, a solve problem supplies `det(A)`.
    pub hint: Option<String>,
    #[serde(default)]
    pub termination: TerminationPolicy,
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Number of participants; 1 runs the sequential path
    #[serde(default = "default_participants")]
    pub participants: usize,
    /// Pacing of partitioned workers
    #[serde(default)]
    pub mode: WorkerMode,
}

fn default_participants() -> usize {
    num_cpus::get().max(1)
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            participants: default_participants(),
            mode: WorkerMode::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file path
    pub json_output: Option<PathBuf>,
    /// Print the list of merged primes in the text summary
    #[serde(default)]
    pub show_primes: bool,
}

/// Remote execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedConfig {
    /// Node service addresses (`host:port`), one worker per entry
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Port the node service listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_port() -> u16 {
    9999
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            listen_port: default_listen_port(),
        }
    }
}

// Display trait implementations

impl fmt::Display for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Problem: {}", self.problem.name())?;
        writeln!(f, "  Reconstruction: {}", self.reconstruction)?;
        writeln!(
            f,
            "  Primes: {:?} {:?}, {} bits",
            self.primes.policy, self.primes.source, self.primes.bits
        )?;
        writeln!(f, "  Workers: {}", self.workers)?;
        if !self.distributed.hosts.is_empty() {
            writeln!(f, "  Hosts: {}", self.distributed.hosts.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for ReconstructionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.builder)?;
        if let Some(ref hint) = self.hint {
            write!(f, " (hint {})", hint)?;
        }
        if let Some(k) = self.termination.stability_threshold {
            write!(f, ", stable after {}", k)?;
        }
        if let Some(bits) = self.termination.bound_bits {
            write!(f, ", bound {} bits", bits)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} participant(s), {:?}", self.participants, self.mode)
    }
}
