//! Single-participant reconstruction
//!
//! Drives a builder in-process with no messaging: draw a usable prime,
//! evaluate, absorb, until the builder terminates. Given the same primes it
//! produces the same value as a distributed run, whatever the arrival order
//! there was.

use crate::builder::ReconstructionBuilder;
use crate::field::PrimeField;
use crate::iteration::Iteration;
use crate::primes::{draw_usable, PrimeSource, UnusablePrimes};
use crate::stats::{Outcome, RunStats};
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info};

pub fn run_sequential(
    mut builder: Box<dyn ReconstructionBuilder>,
    iteration: &dyn Iteration,
    mut source: Box<dyn PrimeSource>,
    filter: &UnusablePrimes,
) -> Result<Outcome> {
    let started = Instant::now();
    let mut stats = RunStats::new();

    while !builder.terminated() {
        let prime = {
            let builder = &builder;
            let stats = &mut stats;
            draw_usable(&mut source, |p| {
                let skip = builder.is_unusable(p) || filter.is_unusable(p);
                if skip {
                    stats.record_skipped();
                }
                skip
            })
        };
        let Some(prime) = prime else {
            anyhow::bail!(
                "Prime source exhausted after {} primes before the reconstruction terminated",
                stats.primes_merged()
            );
        };

        let field = PrimeField::new(prime)?;
        let residue = iteration
            .evaluate(&field)
            .with_context(|| format!("Iteration failed at prime {}", prime))?;
        builder
            .absorb(prime, &residue)
            .with_context(|| format!("Failed to merge prime {}", prime))?;

        stats.record_received(0);
        stats.record_merge(prime);
        debug!(prime, bits = builder.modulus_bits(), "merged residue");
    }

    let value = builder.result().context("Failed to extract the reconstruction")?;
    stats.modulus_bits = builder.modulus_bits();
    stats.elapsed = started.elapsed();
    info!(primes = stats.primes_merged(), bits = stats.modulus_bits, "reconstruction complete");

    Ok(Outcome { value, stats })
}
