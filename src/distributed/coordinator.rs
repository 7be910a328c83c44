//! Reconstruction coordinator
//!
//! The single control loop of a distributed run:
//!
//! ```text
//! DISPATCHING --> COLLECTING --(terminated)--> DRAINING --(all drained)--> DONE
//! ```
//!
//! - **Dispatching**: every worker gets its first assignment
//! - **Collecting**: receive from any worker, merge, then either hand the
//!   sender more work or, once the builder reports termination, its poison pill
//! - **Draining**: keep receiving until every worker has been poisoned and has
//!   acknowledged; a residue from a worker not yet poisoned is still merged
//!   before that worker gets its pill, residues from poisoned workers are
//!   consumed and discarded
//! - **Done**: extract the result
//!
//! The coordinator is the only writer of the builder, the assignment map and
//! the poison set, so none of them needs a lock.

use super::protocol::{Message, ResidueMessage};
use super::transport::{CoordinatorTransport, WorkerId};
use super::worker::WorkerMode;
use crate::builder::ReconstructionBuilder;
use crate::primes::{draw_usable, PrimeSource, UnusablePrimes};
use crate::stats::{Outcome, RunStats};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dispatching,
    Collecting,
    Draining,
    Done,
}

/// Who owns the prime stream
enum Assignment {
    /// Coordinator draws every prime; `in_flight` maps each busy worker to its prime
    Centralized {
        source: Box<dyn PrimeSource>,
        in_flight: HashMap<WorkerId, u64>,
    },
    /// Workers draw from their own streams
    Partitioned,
}

/// Reconstruction coordinator over any transport
pub struct Coordinator<T> {
    transport: T,
    builder: Box<dyn ReconstructionBuilder>,
    filter: UnusablePrimes,
    assignment: Assignment,
    mode: WorkerMode,
    phase: Phase,
    poisoned: HashSet<WorkerId>,
    drained: HashSet<WorkerId>,
    flag_raised: bool,
    exhausted: bool,
    stats: RunStats,
}

impl<T: CoordinatorTransport> Coordinator<T> {
    /// Coordinator assigning primes from `source`
    ///
    /// Candidates rejected by the builder or by `filter`, or currently in
    /// flight to another worker, are skipped.
    pub fn centralized(
        transport: T,
        builder: Box<dyn ReconstructionBuilder>,
        source: Box<dyn PrimeSource>,
        filter: UnusablePrimes,
    ) -> Self {
        Self::new(
            transport,
            builder,
            filter,
            Assignment::Centralized {
                source,
                in_flight: HashMap::new(),
            },
            WorkerMode::Paced,
        )
    }

    /// Coordinator for workers that draw their own primes
    pub fn partitioned(transport: T, builder: Box<dyn ReconstructionBuilder>, mode: WorkerMode) -> Self {
        Self::new(transport, builder, UnusablePrimes::none(), Assignment::Partitioned, mode)
    }

    fn new(
        transport: T,
        builder: Box<dyn ReconstructionBuilder>,
        filter: UnusablePrimes,
        assignment: Assignment,
        mode: WorkerMode,
    ) -> Self {
        Self {
            transport,
            builder,
            filter,
            assignment,
            mode,
            phase: Phase::Dispatching,
            poisoned: HashSet::new(),
            drained: HashSet::new(),
            flag_raised: false,
            exhausted: false,
            stats: RunStats::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drive the run to completion
    pub async fn run(mut self) -> Result<Outcome> {
        let started = Instant::now();
        let workers = self.transport.num_workers();
        if workers == 0 {
            anyhow::bail!("Coordinator needs at least one worker");
        }

        info!(workers, mode = ?self.mode, centralized = self.is_centralized(), "dispatching");
        for worker in 0..workers {
            self.dispatch(worker).await?;
        }
        self.phase = Phase::Collecting;

        while self.drained.len() < workers {
            let (worker, msg) = self
                .transport
                .receive_any()
                .await
                .context("Coordinator lost a worker")?;

            match msg {
                Message::Residue(residue) => self.on_residue(worker, residue).await?,
                Message::DrainAck => self.on_drain_ack(worker).await?,
                Message::Error(err) => {
                    anyhow::bail!("Worker {} on {} failed: {}", worker, err.node_id, err.error)
                }
                other => anyhow::bail!("Unexpected message from worker {}: {:?}", worker, other),
            }
        }

        if self.phase != Phase::Draining {
            anyhow::bail!(
                "Prime source exhausted after {} primes before the reconstruction terminated",
                self.stats.primes_merged()
            );
        }

        self.phase = Phase::Done;
        let value = self.builder.result().context("Failed to extract the reconstruction")?;
        self.stats.modulus_bits = self.builder.modulus_bits();
        self.stats.elapsed = started.elapsed();
        info!(
            primes = self.stats.primes_merged(),
            bits = self.stats.modulus_bits,
            late = self.stats.late_discarded,
            "reconstruction complete"
        );

        Ok(Outcome {
            value,
            stats: self.stats,
        })
    }

    fn is_centralized(&self) -> bool {
        matches!(self.assignment, Assignment::Centralized { .. })
    }

    async fn on_residue(&mut self, worker: WorkerId, residue: ResidueMessage) -> Result<()> {
        self.stats.record_received(worker);

        if self.poisoned.contains(&worker) {
            self.stats.record_late();
            debug!(worker, prime = residue.prime, "discarding late residue");
            return Ok(());
        }

        if let Assignment::Centralized { in_flight, .. } = &mut self.assignment {
            match in_flight.remove(&worker) {
                Some(assigned) if assigned == residue.prime => {}
                assigned => anyhow::bail!(
                    "Worker {} returned prime {} but was assigned {:?}",
                    worker,
                    residue.prime,
                    assigned
                ),
            }
        }

        self.builder
            .absorb(residue.prime, &residue.values)
            .with_context(|| format!("Failed to merge prime {} from worker {}", residue.prime, worker))?;
        self.stats.record_merge(residue.prime);
        debug!(
            worker,
            prime = residue.prime,
            bits = self.builder.modulus_bits(),
            "merged residue"
        );

        // Draining is sticky even if a later merge resets the stability streak
        if self.phase == Phase::Draining {
            self.stop(worker).await
        } else if self.builder.terminated() {
            info!(
                primes = self.stats.primes_merged(),
                bits = self.builder.modulus_bits(),
                "terminated, draining workers"
            );
            self.phase = Phase::Draining;
            if !self.flag_raised {
                self.transport.raise_stop_flag();
                self.flag_raised = true;
            }
            self.stop(worker).await
        } else {
            self.dispatch(worker).await
        }
    }

    async fn on_drain_ack(&mut self, worker: WorkerId) -> Result<()> {
        if self.drained.contains(&worker) {
            anyhow::bail!("Worker {} acknowledged its drain twice", worker);
        }
        if !self.poisoned.contains(&worker) {
            // A polling worker saw the stop flag before its pill
            if self.phase != Phase::Draining {
                anyhow::bail!("Worker {} stopped before the reconstruction terminated", worker);
            }
            self.stop(worker).await?;
        }
        self.drained.insert(worker);
        debug!(worker, drained = self.drained.len(), "worker drained");
        Ok(())
    }

    /// Give `worker` its next unit of work
    async fn dispatch(&mut self, worker: WorkerId) -> Result<()> {
        match (self.is_centralized(), self.mode) {
            (true, _) => match self.draw() {
                Some(prime) => {
                    if let Assignment::Centralized { in_flight, .. } = &mut self.assignment {
                        in_flight.insert(worker, prime);
                    }
                    self.transport.send(worker, Message::Assign(prime)).await
                }
                None => {
                    if !self.exhausted {
                        warn!("prime source exhausted");
                        self.exhausted = true;
                    }
                    self.stop(worker).await
                }
            },
            (false, WorkerMode::Paced) => self.transport.send(worker, Message::Continue).await,
            (false, WorkerMode::Polling) => Ok(()),
        }
    }

    /// Next usable prime from the central source
    fn draw(&mut self) -> Option<u64> {
        let Assignment::Centralized { source, in_flight } = &mut self.assignment else {
            return None;
        };
        let builder = &self.builder;
        let filter = &self.filter;
        let stats = &mut self.stats;
        draw_usable(source, |p| {
            let skip = builder.is_unusable(p) || filter.is_unusable(p) || in_flight.values().any(|&q| q == p);
            if skip {
                stats.record_skipped();
            }
            skip
        })
    }

    /// Send the poison pill, at most once per worker
    async fn stop(&mut self, worker: WorkerId) -> Result<()> {
        if !self.poisoned.insert(worker) {
            return Ok(());
        }
        self.stats.record_poison();
        debug!(worker, "sending poison pill");
        self.transport.send(worker, Message::Stop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{IntegerCra, Reconstructed, TerminationPolicy};
    use crate::distributed::protocol::ErrorMessage;
    use crate::field::PrimeField;
    use crate::primes::fixed::FixedPrimes;
    use async_trait::async_trait;
    use num_bigint::BigInt;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const X: i64 = 4242;
    const P: [u64; 5] = [1_000_003, 1_000_033, 1_000_037, 1_000_039, 1_000_081];

    /// Replays a fixed arrival sequence and records every send
    struct ScriptedTransport {
        workers: usize,
        script: VecDeque<(WorkerId, Message)>,
        sent: Arc<Mutex<Vec<(WorkerId, Message)>>>,
        flag_raises: Arc<Mutex<usize>>,
    }

    impl ScriptedTransport {
        fn new(workers: usize, script: Vec<(WorkerId, Message)>) -> Self {
            Self {
                workers,
                script: script.into(),
                sent: Arc::new(Mutex::new(Vec::new())),
                flag_raises: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl CoordinatorTransport for ScriptedTransport {
        fn num_workers(&self) -> usize {
            self.workers
        }

        async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
            self.sent.lock().unwrap().push((to, msg));
            Ok(())
        }

        async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
            self.script.pop_front().context("script exhausted")
        }

        fn raise_stop_flag(&mut self) {
            *self.flag_raises.lock().unwrap() += 1;
        }
    }

    fn residue(p: u64) -> Message {
        Message::Residue(ResidueMessage {
            prime: p,
            values: vec![PrimeField::new(p).unwrap().reduce_i64(X)],
        })
    }

    fn stops_sent(sent: &[(WorkerId, Message)], worker: WorkerId) -> usize {
        sent.iter()
            .filter(|(to, msg)| *to == worker && *msg == Message::Stop)
            .count()
    }

    #[tokio::test]
    async fn test_late_messages_are_consumed_not_merged() {
        // K = 1: the second merge terminates
        let script = vec![
            (0, residue(P[0])),
            (1, residue(P[1])),
            (1, residue(P[2])), // late: worker 1 already poisoned
            (0, residue(P[3])), // worker 0 not yet poisoned: merged, then stopped
            (0, residue(P[4])), // late
            (1, Message::DrainAck),
            (0, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);
        let flag = Arc::clone(&transport.flag_raises);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::stability(1)));
        let outcome = Coordinator::partitioned(transport, builder, WorkerMode::Paced)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.value, Reconstructed::Integer(vec![BigInt::from(X)]));
        assert_eq!(outcome.stats.merged_primes, vec![P[0], P[1], P[3]]);
        assert_eq!(outcome.stats.late_discarded, 2);
        assert_eq!(outcome.stats.poison_pills, 2);
        assert_eq!(*flag.lock().unwrap(), 1);

        let sent = sent.lock().unwrap();
        assert_eq!(stops_sent(&sent, 0), 1);
        assert_eq!(stops_sent(&sent, 1), 1);
    }

    #[tokio::test]
    async fn test_unpoisoned_residue_after_termination_is_merged() {
        // The first residue already exceeds the bound
        let script = vec![
            (0, residue(P[0])),
            (1, residue(P[1])),
            (0, Message::DrainAck),
            (1, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::bound(5)));
        let outcome = Coordinator::partitioned(transport, builder, WorkerMode::Paced)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.value, Reconstructed::Integer(vec![BigInt::from(X)]));
        assert_eq!(outcome.stats.merged_primes, vec![P[0], P[1]]);
        assert_eq!(outcome.stats.late_discarded, 0);

        let sent = sent.lock().unwrap();
        assert_eq!(stops_sent(&sent, 0), 1);
        assert_eq!(stops_sent(&sent, 1), 1);
        // Worker 1 was never given more work after termination
        let continues = sent.iter().filter(|(to, msg)| *to == 1 && *msg == Message::Continue).count();
        assert_eq!(continues, 1);
    }

    #[tokio::test]
    async fn test_in_flight_assignment_is_merged_while_draining() {
        // Worker 1 still holds P[1] when worker 0 terminates the run
        let script = vec![
            (0, residue(P[0])),
            (1, residue(P[1])),
            (0, Message::DrainAck),
            (1, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::bound(5)));
        let source = Box::new(FixedPrimes::new(P.to_vec()));
        let outcome = Coordinator::centralized(transport, builder, source, UnusablePrimes::none())
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.stats.merged_primes, vec![P[0], P[1]]);
        let sent = sent.lock().unwrap();
        let assigned = sent.iter().filter(|(_, msg)| matches!(msg, Message::Assign(_))).count();
        assert_eq!(assigned, 2);
    }

    #[tokio::test]
    async fn test_centralized_assignment_and_drain() {
        // Worker 0 gets P[0], worker 1 gets P[1]; P[2] goes to whoever answers first
        let script = vec![
            (1, residue(P[1])),
            (0, residue(P[0])),
            (1, residue(P[2])),
            (1, Message::DrainAck),
            (0, residue(P[3])),
            (0, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::stability(2)));
        let source = Box::new(FixedPrimes::new(P.to_vec()));
        let coordinator = Coordinator::centralized(transport, builder, source, UnusablePrimes::none());
        assert_eq!(coordinator.phase(), Phase::Dispatching);
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.value.to_string(), X.to_string());
        assert_eq!(outcome.stats.merged_primes, vec![P[1], P[0], P[2]]);

        let sent = sent.lock().unwrap();
        let assigned: Vec<(WorkerId, u64)> = sent
            .iter()
            .filter_map(|(to, msg)| match msg {
                Message::Assign(p) => Some((*to, *p)),
                _ => None,
            })
            .collect();
        assert_eq!(assigned, vec![(0, P[0]), (1, P[1]), (1, P[2]), (0, P[3])]);
        assert_eq!(stops_sent(&sent, 0), 1);
        assert_eq!(stops_sent(&sent, 1), 1);
    }

    #[tokio::test]
    async fn test_centralized_skips_unusable_primes() {
        let script = vec![(0, residue(P[2])), (0, Message::DrainAck)];
        let transport = ScriptedTransport::new(1, script);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::bound(8)));
        let source = Box::new(FixedPrimes::new(P.to_vec()));
        let filter = UnusablePrimes::dividing(BigInt::from(P[0] * P[1]));
        let outcome = Coordinator::centralized(transport, builder, source, filter)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.stats.merged_primes, vec![P[2]]);
        assert_eq!(outcome.stats.skipped_unusable, 2);
    }

    #[tokio::test]
    async fn test_polling_drain_ack_before_pill() {
        // Worker 1 sees the stop flag and acknowledges before being poisoned
        let script = vec![
            (0, residue(P[0])),
            (0, residue(P[1])),
            (1, Message::DrainAck),
            (0, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);

        let builder = Box::new(IntegerCra::new(TerminationPolicy::stability(1)));
        let outcome = Coordinator::partitioned(transport, builder, WorkerMode::Polling)
            .run()
            .await
            .unwrap();
        assert_eq!(outcome.stats.poison_pills, 2);

        let sent = sent.lock().unwrap();
        // Polling workers are never sent work
        assert!(sent.iter().all(|(_, msg)| *msg == Message::Stop));
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn test_drain_ack_before_termination_is_fatal() {
        let script = vec![(0, residue(P[0])), (1, Message::DrainAck)];
        let transport = ScriptedTransport::new(2, script);
        let builder = Box::new(IntegerCra::new(TerminationPolicy::default()));
        let result = Coordinator::partitioned(transport, builder, WorkerMode::Paced).run().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wrong_prime_is_fatal() {
        let script = vec![(0, residue(P[4]))];
        let transport = ScriptedTransport::new(1, script);
        let builder = Box::new(IntegerCra::new(TerminationPolicy::default()));
        let source = Box::new(FixedPrimes::new(P.to_vec()));
        let result = Coordinator::centralized(transport, builder, source, UnusablePrimes::none())
            .run()
            .await;
        assert!(result.unwrap_err().to_string().contains("assigned"));
    }

    #[tokio::test]
    async fn test_duplicate_partitioned_prime_is_fatal() {
        let script = vec![(0, residue(P[0])), (1, residue(P[0]))];
        let transport = ScriptedTransport::new(2, script);
        let builder = Box::new(IntegerCra::new(TerminationPolicy::default()));
        let result = Coordinator::partitioned(transport, builder, WorkerMode::Paced).run().await;
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("not coprime"));
    }

    #[tokio::test]
    async fn test_worker_error_is_fatal() {
        let script = vec![(
            0,
            Message::Error(ErrorMessage {
                worker_id: 0,
                node_id: "local".to_string(),
                error: "singular".to_string(),
            }),
        )];
        let transport = ScriptedTransport::new(1, script);
        let builder = Box::new(IntegerCra::new(TerminationPolicy::default()));
        let result = Coordinator::partitioned(transport, builder, WorkerMode::Paced).run().await;
        assert!(result.unwrap_err().to_string().contains("singular"));
    }

    #[tokio::test]
    async fn test_exhausted_source_stops_workers_then_fails() {
        let script = vec![
            (1, Message::DrainAck),
            (0, residue(P[0])),
            (0, Message::DrainAck),
        ];
        let transport = ScriptedTransport::new(2, script);
        let sent = Arc::clone(&transport.sent);
        let builder = Box::new(IntegerCra::new(TerminationPolicy::default()));
        let source = Box::new(FixedPrimes::new(vec![P[0]]));
        let result = Coordinator::centralized(transport, builder, source, UnusablePrimes::none())
            .run()
            .await;

        assert!(result.unwrap_err().to_string().contains("exhausted"));
        let sent = sent.lock().unwrap();
        assert_eq!(stops_sent(&sent, 0), 1);
        assert_eq!(stops_sent(&sent, 1), 1);
    }
}
