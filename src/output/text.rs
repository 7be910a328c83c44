//! Human-readable text output

use super::json::format_duration_human;
use crate::config::JobConfig;
use crate::stats::Outcome;

/// Print the result and run counters to the console
pub fn print_results(outcome: &Outcome, config: &JobConfig, participants: usize) {
    let stats = &outcome.stats;

    println!("═══════════════════════════════════════════════════════════");
    println!("                 RECONSTRUCTION RESULT");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    println!("Problem:      {}", config.problem.name());
    println!("Strategy:     {}", config.reconstruction);
    println!("Participants: {}", participants);
    println!("Elapsed Time: {}", format_duration_human(stats.elapsed));
    println!();

    println!("Value ({}, {} element(s)):", outcome.value.kind(), outcome.value.len());
    for (i, v) in outcome.value.to_strings().iter().enumerate() {
        println!("  [{}] {}", i, v);
    }
    println!();

    println!("Primes:");
    println!("  Merged:    {} ({} bits of modulus)", stats.primes_merged(), stats.modulus_bits);
    println!("  Received:  {}", stats.residues_received());
    println!("  Late:      {}", stats.late_discarded);
    println!("  Skipped:   {}", stats.skipped_unusable);
    if config.output.show_primes {
        let primes: Vec<String> = stats.merged_primes.iter().map(|p| p.to_string()).collect();
        println!("  List:      {}", primes.join(", "));
    }

    if stats.residues_per_worker.len() > 1 {
        println!();
        println!("Per-worker residues:");
        for (worker, count) in &stats.residues_per_worker {
            println!("  Worker {}: {}", worker, count);
        }
    }
    println!();

    println!("═══════════════════════════════════════════════════════════");
}
