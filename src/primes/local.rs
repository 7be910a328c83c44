//! Worker-local prime stream
//!
//! Under the partitioned policy each worker draws its own primes. The stream
//! remembers every prime it has handed out so the same worker never computes
//! at one prime twice. Nothing is shared across workers.

use super::{draw_usable, PrimeSource, UnusablePrimes};
use std::collections::HashSet;

/// Independent prime stream owned by a single worker
pub struct LocalPrimeStream {
    source: Box<dyn PrimeSource>,
    filter: UnusablePrimes,
    used: HashSet<u64>,
}

impl LocalPrimeStream {
    pub fn new(source: Box<dyn PrimeSource>, filter: UnusablePrimes) -> Self {
        Self {
            source,
            filter,
            used: HashSet::new(),
        }
    }

    /// Next prime this worker has not used and the filter accepts
    pub fn draw(&mut self) -> Option<u64> {
        let filter = &self.filter;
        let used = &self.used;
        let p = draw_usable(&mut self.source, |p| used.contains(&p) || filter.is_unusable(p))?;
        self.used.insert(p);
        Some(p)
    }

    /// Number of primes drawn so far
    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}

impl std::fmt::Debug for LocalPrimeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPrimeStream")
            .field("filter", &self.filter)
            .field("used", &self.used.len())
            .finish()
    }
}
