//! Run statistics
//!
//! Counters describing one reconstruction run. Every field is written by a
//! single owner (the coordinator, the sequential driver or one worker), so
//! plain integers suffice.

use crate::builder::Reconstructed;
use crate::distributed::transport::WorkerId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Coordinator-side counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Primes successfully merged, in merge order
    pub merged_primes: Vec<u64>,

    /// Residues received per worker, merged or not
    pub residues_per_worker: BTreeMap<WorkerId, u64>,

    /// Residues consumed without being merged
    pub late_discarded: u64,

    /// Poison pills sent
    pub poison_pills: u64,

    /// Candidates rejected by the unusable predicate
    pub skipped_unusable: u64,

    /// Bit length of the final modulus
    pub modulus_bits: u64,

    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self, worker: WorkerId) {
        *self.residues_per_worker.entry(worker).or_insert(0) += 1;
    }

    pub fn record_merge(&mut self, prime: u64) {
        self.merged_primes.push(prime);
    }

    pub fn record_late(&mut self) {
        self.late_discarded += 1;
    }

    pub fn record_poison(&mut self) {
        self.poison_pills += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_unusable += 1;
    }

    pub fn primes_merged(&self) -> usize {
        self.merged_primes.len()
    }

    pub fn residues_received(&self) -> u64 {
        self.residues_per_worker.values().sum()
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} primes merged ({} bits), {} late, {} skipped, {:.3}s",
            self.primes_merged(),
            self.modulus_bits,
            self.late_discarded,
            self.skipped_unusable,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Worker-side counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub worker_id: WorkerId,

    /// Residues computed and sent
    pub residues_sent: u64,

    /// Time spent inside the iteration
    pub compute_time: Duration,
}

impl WorkerStats {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    pub fn record_residue(&mut self, elapsed: Duration) {
        self.residues_sent += 1;
        self.compute_time += elapsed;
    }
}

/// Final value and counters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub value: Reconstructed,
    pub stats: RunStats,
}
