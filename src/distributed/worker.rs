//! Reconstruction worker
//!
//! A worker evaluates the iteration at one prime at a time and sends every
//! residue back tagged with its prime. Two loop shapes exist:
//!
//! - **Paced**: block on the coordinator for `Assign`, `Continue` or `Stop`
//! - **Polling** (partitioned only): compute back to back, checking the stop
//!   signal between residues
//!
//! Either way the last message a worker sends is exactly one `DrainAck`, and a
//! worker only exits after it has received its `Stop`.

use super::protocol::{ErrorMessage, Message, ResidueMessage};
use super::transport::{WorkerId, WorkerTransport};
use crate::field::PrimeField;
use crate::iteration::Iteration;
use crate::primes::LocalPrimeStream;
use crate::stats::WorkerStats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// How a worker paces its computations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerMode {
    /// One residue per coordinator message
    #[default]
    Paced,
    /// Compute until the stop signal is observed
    Polling,
}

pub struct Worker<T> {
    id: WorkerId,
    node_id: String,
    transport: T,
    iteration: Arc<dyn Iteration>,
    mode: WorkerMode,
    stream: Option<LocalPrimeStream>,
    stats: WorkerStats,
}

impl<T: WorkerTransport> Worker<T> {
    /// Worker computing at the primes the coordinator assigns
    pub fn centralized(id: WorkerId, node_id: String, transport: T, iteration: Arc<dyn Iteration>) -> Self {
        Self {
            id,
            node_id,
            transport,
            iteration,
            mode: WorkerMode::Paced,
            stream: None,
            stats: WorkerStats::new(id),
        }
    }

    /// Worker drawing from its own prime stream
    pub fn partitioned(
        id: WorkerId,
        node_id: String,
        transport: T,
        iteration: Arc<dyn Iteration>,
        stream: LocalPrimeStream,
        mode: WorkerMode,
    ) -> Self {
        Self {
            id,
            node_id,
            transport,
            iteration,
            mode,
            stream: Some(stream),
            stats: WorkerStats::new(id),
        }
    }

    /// Run until the poison pill arrives
    pub async fn run(mut self) -> Result<WorkerStats> {
        debug!(worker = self.id, mode = ?self.mode, "worker started");
        match self.mode {
            WorkerMode::Paced => self.run_paced().await?,
            WorkerMode::Polling => self.run_polling().await?,
        }
        debug!(worker = self.id, residues = self.stats.residues_sent, "worker stopped");
        Ok(self.stats)
    }

    async fn run_paced(&mut self) -> Result<()> {
        loop {
            match self.transport.receive().await? {
                Message::Assign(prime) => self.compute_and_send(prime).await?,
                Message::Continue => {
                    let prime = self.next_prime().await?;
                    self.compute_and_send(prime).await?;
                }
                Message::Stop => {
                    self.transport.send(Message::DrainAck).await?;
                    return Ok(());
                }
                other => anyhow::bail!("Worker {} got unexpected message: {:?}", self.id, other),
            }
        }
    }

    async fn run_polling(&mut self) -> Result<()> {
        while !self.transport.stop_requested() {
            let prime = self.next_prime().await?;
            self.compute_and_send(prime).await?;
        }
        self.transport.send(Message::DrainAck).await?;

        // The pill may still be in flight when only the flag was seen
        match self.transport.receive().await? {
            Message::Stop => Ok(()),
            other => anyhow::bail!("Worker {} expected STOP after draining, got {:?}", self.id, other),
        }
    }

    async fn next_prime(&mut self) -> Result<u64> {
        let drawn = self.stream.as_mut().and_then(LocalPrimeStream::draw);
        match drawn {
            Some(prime) => Ok(prime),
            None => {
                let err = if self.stream.is_some() {
                    anyhow::anyhow!("Worker {} exhausted its prime stream", self.id)
                } else {
                    anyhow::anyhow!("Worker {} has no prime stream of its own", self.id)
                };
                self.report(&err).await;
                Err(err)
            }
        }
    }

    async fn compute_and_send(&mut self, prime: u64) -> Result<()> {
        let iteration = Arc::clone(&self.iteration);
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || -> Result<Vec<u64>> {
            let field = PrimeField::new(prime)?;
            iteration.evaluate(&field)
        })
        .await
        .context("Iteration task panicked")?;

        let values = match result {
            Ok(values) => values,
            Err(e) => {
                let err = e.context(format!("Iteration failed at prime {}", prime));
                self.report(&err).await;
                return Err(err);
            }
        };
        self.stats.record_residue(started.elapsed());
        debug!(worker = self.id, prime, "residue computed");

        self.transport
            .send(Message::Residue(ResidueMessage { prime, values }))
            .await
    }

    /// Tell the coordinator why this worker is giving up
    async fn report(&mut self, err: &anyhow::Error) {
        let msg = Message::Error(ErrorMessage {
            worker_id: self.id,
            node_id: self.node_id.clone(),
            error: format!("{:#}", err),
        });
        if let Err(e) = self.transport.send(msg).await {
            warn!(worker = self.id, error = %e, "failed to report worker error");
        }
    }
}
