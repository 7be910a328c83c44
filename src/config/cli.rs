//! CLI argument parsing using clap

use crate::builder::BuilderKind;
use crate::distributed::WorkerMode;
use crate::primes::{PrimePolicy, SourceKind};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// In-process, no workers
    Sequential,
    /// In-process worker pool (default); falls back to sequential with one participant
    Local,
    /// Drive workers hosted by node services over TCP
    Coordinator,
    /// Run a node service that hosts workers for a coordinator
    Service,
}

/// crtpool - distributed incremental Chinese remaindering
#[derive(Parser, Debug)]
#[command(name = "crtpool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: sequential, local, coordinator, or service
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// TOML job file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Port for service to listen on (service mode only)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Comma-separated list of node addresses for coordinator mode (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    #[arg(long)]
    pub host_list: Option<String>,

    // === Problem ===
    /// Comma-separated values to reconstruct (e.g., "12345,-7,22/7")
    #[arg(long, allow_hyphen_values = true)]
    pub values: Option<String>,

    /// Reconstruction strategy
    #[arg(long, value_enum)]
    pub builder: Option<BuilderKind>,

    /// Known denominator multiple for the hinted-rational strategy
    #[arg(long, allow_hyphen_values = true)]
    pub hint: Option<String>,

    // === Termination ===
    /// Stop after this many consecutive agreeing primes
    #[arg(short = 'k', long)]
    pub stability: Option<usize>,

    /// Stop once the modulus exceeds twice this many bits of magnitude
    #[arg(long)]
    pub bound_bits: Option<u64>,

    /// Disable the stability condition (requires --bound-bits)
    #[arg(long)]
    pub no_stability: bool,

    // === Primes and workers ===
    /// Number of participants
    #[arg(short = 'n', long)]
    pub participants: Option<usize>,

    /// Who draws primes
    #[arg(long, value_enum)]
    pub policy: Option<PrimePolicy>,

    /// Prime generator
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Worker pacing (polling requires --policy partitioned)
    #[arg(long, value_enum)]
    pub worker_mode: Option<WorkerMode>,

    /// Bit length of generated primes (3-62)
    #[arg(long)]
    pub prime_bits: Option<u32>,

    /// Seed of the random prime source
    #[arg(long)]
    pub seed: Option<u64>,

    // === Output ===
    /// Write a JSON report to this path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// List merged primes in the summary
    #[arg(long)]
    pub show_primes: bool,

    /// Print the effective configuration before running
    #[arg(long)]
    pub show_config: bool,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,
}
