//! Reconstruction engine
//!
//! Turns a [`JobConfig`] into a running reconstruction. [`PreparedJob`] holds
//! everything derived from the configuration that every participant needs
//! (the iteration, the unusable-prime filter, the denominator hint);
//! [`Reconstructor`] picks the execution path.
//!
//! # Paths
//!
//! - **Sequential**: one participant, the builder driven in-process
//! - **Local**: coordinator and workers as tasks of this process
//! - **Remote**: workers hosted by node services over TCP

use crate::builder::{new_builder, BuilderKind, ReconstructionBuilder};
use crate::config::JobConfig;
use crate::distributed::{
    local_pool, Coordinator, CoordinatorTransport, TcpCoordinator, Worker, WorkerId, WorkerTransport,
};
use crate::iteration::Iteration;
use crate::primes::{LocalPrimeStream, PrimePolicy, UnusablePrimes};
use crate::sequential::run_sequential;
use crate::stats::Outcome;
use anyhow::{anyhow, Context, Result};
use num_bigint::BigInt;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration resolved into live collaborators
pub struct PreparedJob {
    config: JobConfig,
    iteration: Arc<dyn Iteration>,
    filter: UnusablePrimes,
    hint: Option<BigInt>,
}

impl PreparedJob {
    pub fn from_config(config: JobConfig) -> Result<Self> {
        let iteration = config.problem.build().context("Failed to build the iteration")?;

        let hint = match config.reconstruction.builder {
            BuilderKind::HintedRational => match &config.reconstruction.hint {
                Some(hint) => Some(
                    hint.trim()
                        .parse::<BigInt>()
                        .with_context(|| format!("Invalid hint: {:?}", hint))?,
                ),
                None => config.problem.denominator_hint(),
            },
            _ => None,
        };

        let mut filter = iteration.unusable();
        if let Some(ref hint) = hint {
            filter = filter.and(UnusablePrimes::dividing(hint.clone()));
        }

        let job = Self {
            config,
            iteration,
            filter,
            hint,
        };
        // Rejects a missing or zero hint before any prime is drawn
        job.builder()?;
        Ok(job)
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn problem_name(&self) -> &'static str {
        self.config.problem.name()
    }

    pub fn iteration(&self) -> Arc<dyn Iteration> {
        Arc::clone(&self.iteration)
    }

    /// Primes no participant may use
    pub fn filter(&self) -> &UnusablePrimes {
        &self.filter
    }

    /// Fresh builder for this job
    pub fn builder(&self) -> Result<Box<dyn ReconstructionBuilder>> {
        let reconstruction = &self.config.reconstruction;
        new_builder(reconstruction.builder, reconstruction.termination, self.hint.clone())
            .context("Failed to create the reconstruction builder")
    }

    /// Prime stream of worker `index` of `count` under the partitioned policy
    pub fn worker_stream(&self, index: usize, count: usize) -> LocalPrimeStream {
        LocalPrimeStream::new(self.config.primes.partition(index, count), self.filter.clone())
    }

    /// Worker `id` of a pool of `count`, configured for this job's policy
    pub fn worker<T: WorkerTransport>(&self, id: WorkerId, node_id: String, transport: T, count: usize) -> Worker<T> {
        match self.config.primes.policy {
            PrimePolicy::Centralized => Worker::centralized(id, node_id, transport, self.iteration()),
            PrimePolicy::Partitioned => Worker::partitioned(
                id,
                node_id,
                transport,
                self.iteration(),
                self.worker_stream(id, count),
                self.config.workers.mode,
            ),
        }
    }

    /// Coordinator over `transport`, configured for this job's policy
    pub fn coordinator<T: CoordinatorTransport>(&self, transport: T) -> Result<Coordinator<T>> {
        let builder = self.builder()?;
        Ok(match self.config.primes.policy {
            PrimePolicy::Centralized => Coordinator::centralized(
                transport,
                builder,
                self.config.primes.central_source(),
                self.filter.clone(),
            ),
            PrimePolicy::Partitioned => Coordinator::partitioned(transport, builder, self.config.workers.mode),
        })
    }
}

/// Entry point of a reconstruction run
pub struct Reconstructor {
    job: PreparedJob,
}

impl Reconstructor {
    pub fn new(config: JobConfig) -> Result<Self> {
        Ok(Self {
            job: PreparedJob::from_config(config)?,
        })
    }

    pub fn job(&self) -> &PreparedJob {
        &self.job
    }

    /// Sequential with one participant, an in-process pool otherwise
    pub async fn run(&self) -> Result<Outcome> {
        if self.job.config.workers.participants <= 1 {
            self.run_sequential()
        } else {
            self.run_local(self.job.config.workers.participants).await
        }
    }

    pub fn run_sequential(&self) -> Result<Outcome> {
        info!(problem = self.job.problem_name(), "running sequentially");
        run_sequential(
            self.job.builder()?,
            self.job.iteration.as_ref(),
            self.job.config.primes.central_source(),
            &self.job.filter,
        )
    }

    /// Coordinator plus `participants` worker tasks in this process
    pub async fn run_local(&self, participants: usize) -> Result<Outcome> {
        info!(
            problem = self.job.problem_name(),
            participants,
            policy = ?self.job.config.primes.policy,
            "running in-process pool"
        );
        let (transport, ends) = local_pool(participants);

        let mut handles = Vec::with_capacity(participants);
        for (id, end) in ends.into_iter().enumerate() {
            let worker = self.job.worker(id, "local".to_string(), end, participants);
            handles.push(tokio::spawn(worker.run()));
        }

        // Dropping the coordinator's channels on failure unblocks every worker
        let result = match self.job.coordinator(transport) {
            Ok(coordinator) => coordinator.run().await,
            Err(e) => Err(e),
        };

        let mut worker_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(stats)) => debug!(
                    worker = stats.worker_id,
                    residues = stats.residues_sent,
                    compute_ms = stats.compute_time.as_millis() as u64,
                    "worker joined"
                ),
                Ok(Err(e)) => {
                    worker_error.get_or_insert(e);
                }
                Err(e) => {
                    worker_error.get_or_insert(anyhow!("Worker task panicked: {}", e));
                }
            }
        }

        let outcome = result?;
        if let Some(e) = worker_error {
            return Err(e.context("A worker failed after the reconstruction completed"));
        }
        Ok(outcome)
    }

    /// Drive workers hosted by node services, one worker per entry of `hosts`
    pub async fn run_remote(&self, hosts: &[String]) -> Result<Outcome> {
        if hosts.is_empty() {
            anyhow::bail!("No hosts specified for coordinator mode");
        }
        info!(problem = self.job.problem_name(), hosts = hosts.len(), "connecting to node services");
        let transport = TcpCoordinator::connect(hosts, &self.job.config).await?;
        self.job.coordinator(transport)?.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Reconstructed;
    use crate::iteration::Problem;
    use crate::rational::Rational;

    fn values_job(values: &[&str], participants: usize) -> JobConfig {
        let mut config = JobConfig {
            problem: Problem::Values {
                values: values.iter().map(|v| v.to_string()).collect(),
            },
            ..JobConfig::default()
        };
        config.workers.participants = participants;
        config
    }

    #[test]
    fn test_prepared_job_hint_from_solve() {
        let mut config = JobConfig {
            problem: Problem::Solve {
                matrix: vec![vec![2, 1], vec![1, 3]],
                rhs: vec![3, 5],
            },
            ..JobConfig::default()
        };
        config.reconstruction.builder = BuilderKind::HintedRational;

        let job = PreparedJob::from_config(config).unwrap();
        assert!(job.filter().is_unusable(5));
        assert!(!job.filter().is_unusable(7));
    }

    #[test]
    fn test_prepared_job_rejects_zero_hint() {
        let mut config = values_job(&["1"], 1);
        config.reconstruction.builder = BuilderKind::HintedRational;
        config.reconstruction.hint = Some("0".to_string());
        assert!(PreparedJob::from_config(config).is_err());
    }

    #[tokio::test]
    async fn test_single_participant_runs_sequentially() {
        let reconstructor = Reconstructor::new(values_job(&["-987654321", "5"], 1)).unwrap();
        let outcome = reconstructor.run().await.unwrap();
        assert_eq!(outcome.value.to_string(), "[-987654321, 5]");
        assert_eq!(outcome.stats.late_discarded, 0);
    }

    #[tokio::test]
    async fn test_local_pool_matches_sequential() {
        let mut config = values_job(&["22/7", "-1/3"], 3);
        config.reconstruction.builder = BuilderKind::Rational;

        let reconstructor = Reconstructor::new(config).unwrap();
        let parallel = reconstructor.run().await.unwrap();
        let sequential = reconstructor.run_sequential().unwrap();

        let expected = Reconstructed::Rational(vec!["22/7".parse::<Rational>().unwrap(), "-1/3".parse().unwrap()]);
        assert_eq!(parallel.value, expected);
        assert_eq!(sequential.value, expected);
    }

    #[test]
    fn test_singular_solve_is_rejected() {
        let mut config = JobConfig {
            problem: Problem::Solve {
                matrix: vec![vec![1, 2], vec![2, 4]],
                rhs: vec![1, 1],
            },
            ..JobConfig::default()
        };
        config.reconstruction.builder = BuilderKind::Rational;

        let err = Reconstructor::new(config).err().unwrap();
        assert!(format!("{:#}", err).contains("singular"));
    }

    #[tokio::test]
    async fn test_solve_skips_primes_dividing_the_determinant() {
        // Walking down from 10008 the first candidate is 10007 = det(A)
        let mut config = JobConfig {
            problem: Problem::Solve {
                matrix: vec![vec![10007]],
                rhs: vec![1],
            },
            ..JobConfig::default()
        };
        config.reconstruction.builder = BuilderKind::Rational;
        config.primes.start = Some(10008);
        config.workers.participants = 2;

        let reconstructor = Reconstructor::new(config).unwrap();
        let expected = Reconstructed::Rational(vec!["1/10007".parse().unwrap()]);
        for outcome in [reconstructor.run().await.unwrap(), reconstructor.run_sequential().unwrap()] {
            assert_eq!(outcome.value, expected);
            assert!(!outcome.stats.merged_primes.contains(&10007));
            assert!(outcome.stats.skipped_unusable >= 1);
        }
    }

    #[tokio::test]
    async fn test_run_remote_needs_hosts() {
        let reconstructor = Reconstructor::new(values_job(&["1"], 2)).unwrap();
        assert!(reconstructor.run_remote(&[]).await.is_err());
    }
}
