//! JSON output formatting
//!
//! A run report carries the reconstructed values as decimal strings (they
//! are arbitrary precision), the run counters and a completion timestamp.

use crate::config::JobConfig;
use crate::stats::Outcome;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// Run counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRunStats {
    pub primes_merged: usize,
    pub merged_primes: Vec<u64>,
    pub modulus_bits: u64,
    pub residues_received: u64,
    /// Keyed by worker id
    pub residues_per_worker: BTreeMap<String, u64>,
    pub late_discarded: u64,
    pub poison_pills: u64,
    pub skipped_unusable: u64,
    pub elapsed: JsonDuration,
}

/// Complete report of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonReport {
    pub problem: String,
    pub strategy: String,
    /// `integer` or `rational`
    pub kind: String,
    pub values: Vec<String>,
    pub participants: usize,
    pub stats: JsonRunStats,
    /// RFC 3339, UTC
    pub finished_at: String,
}

/// Build the report of `outcome`
pub fn build_report(config: &JobConfig, participants: usize, outcome: &Outcome) -> JsonReport {
    let stats = &outcome.stats;
    JsonReport {
        problem: config.problem.name().to_string(),
        strategy: format!("{:?}", config.reconstruction.builder),
        kind: outcome.value.kind().to_string(),
        values: outcome.value.to_strings(),
        participants,
        stats: JsonRunStats {
            primes_merged: stats.primes_merged(),
            merged_primes: stats.merged_primes.clone(),
            modulus_bits: stats.modulus_bits,
            residues_received: stats.residues_received(),
            residues_per_worker: stats
                .residues_per_worker
                .iter()
                .map(|(id, n)| (id.to_string(), *n))
                .collect(),
            late_discarded: stats.late_discarded,
            poison_pills: stats.poison_pills,
            skipped_unusable: stats.skipped_unusable,
            elapsed: JsonDuration::from_duration(stats.elapsed),
        },
        finished_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// The values alone, as a JSON array of strings
///
/// Stable across runs of the same job, unlike the full report.
pub fn values_json(outcome: &Outcome) -> Result<String> {
    serde_json::to_string(&outcome.value.to_strings()).context("Failed to serialize values")
}

/// Write JSON output to file
pub fn write_json_report(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, report)?;
    } else {
        serde_json::to_writer(file, report)?;
    }

    Ok(())
}

/// Format duration in human-readable format
pub(crate) fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    }
}
