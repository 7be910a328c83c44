//! End-to-end reconstruction runs over the in-process and TCP transports

use crtpool::builder::{BuilderKind, IntegerCra, Reconstructed, ReconstructionBuilder, TerminationPolicy};
use crtpool::config::JobConfig;
use crtpool::distributed::{
    local_pool, Coordinator, Message, NodeService, ResidueMessage, WorkerMode, WorkerTransport,
};
use crtpool::field::PrimeField;
use crtpool::iteration::{Iteration, Problem};
use crtpool::output::json::values_json;
use crtpool::primes::{PrimePolicy, SourceKind};
use crtpool::rational::Rational;
use crtpool::Reconstructor;
use num_bigint::BigInt;
use proptest::prelude::*;
use tokio::net::TcpListener;

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

fn integers(values: &[i64]) -> Reconstructed {
    Reconstructed::Integer(values.iter().map(|&v| BigInt::from(v)).collect())
}

#[tokio::test]
async fn centralized_paced_pool() {
    let config = values_job(&["123456789012345678", "-1", "0"], 4);
    let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();

    assert_eq!(outcome.value, integers(&[123_456_789_012_345_678, -1, 0]));
    // Every worker received exactly one pill
    assert_eq!(outcome.stats.poison_pills, 4);
    let mut merged = outcome.stats.merged_primes.clone();
    merged.sort_unstable();
    merged.dedup();
    assert_eq!(merged.len(), outcome.stats.primes_merged());
}

#[tokio::test]
async fn partitioned_paced_pool_with_strided_streams() {
    // Worker counts sharing a factor with the odd start 2^39 + 1 or 2^19 + 1
    for (participants, bits) in [(3, 40), (3, 20), (6, 20)] {
        let mut config = values_job(&["-98765432109876"], participants);
        config.primes.policy = PrimePolicy::Partitioned;
        config.primes.source = SourceKind::Strided;
        config.primes.bits = bits;

        let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();
        assert_eq!(outcome.value, integers(&[-98_765_432_109_876]));
        assert_eq!(outcome.stats.poison_pills, participants as u64);
    }
}

#[tokio::test]
async fn residue_from_unstopped_worker_after_termination_is_merged() {
    let (coordinator, mut workers) = local_pool(2);
    let primes = [1_000_003u64, 1_000_033];

    // Both residues are queued before the coordinator sees the first one
    for (worker, &p) in workers.iter_mut().zip(&primes) {
        let field = PrimeField::new(p).unwrap();
        let residue = ResidueMessage {
            prime: p,
            values: vec![field.reduce_i64(-77)],
        };
        worker.send(Message::Residue(residue)).await.unwrap();
    }
    for worker in workers.iter_mut() {
        worker.send(Message::DrainAck).await.unwrap();
    }

    // A single 20-bit prime already exceeds the bound
    let builder = Box::new(IntegerCra::new(TerminationPolicy::bound(5)));
    let outcome = Coordinator::partitioned(coordinator, builder, WorkerMode::Paced)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.value, integers(&[-77]));
    assert_eq!(outcome.stats.merged_primes, primes.to_vec());
    assert_eq!(outcome.stats.late_discarded, 0);
    for worker in workers.iter_mut() {
        assert_eq!(worker.receive().await.unwrap(), Message::Continue);
        assert_eq!(worker.receive().await.unwrap(), Message::Stop);
    }
}

#[tokio::test]
async fn random_source_running_out_of_primes_fails() {
    let mut config = values_job(&["1000"], 2);
    config.primes.source = SourceKind::Random;
    config.primes.bits = 3;

    let err = Reconstructor::new(config).unwrap().run().await.unwrap_err();
    assert!(err.to_string().contains("exhausted"));
}

#[tokio::test]
async fn solve_with_prime_dividing_the_determinant() {
    let mut config = JobConfig {
        problem: Problem::Solve {
            matrix: vec![vec![10007]],
            rhs: vec![1],
        },
        ..JobConfig::default()
    };
    config.reconstruction.builder = BuilderKind::Rational;
    config.primes.source = SourceKind::Fixed;
    config.primes.list = vec![
        10007, 1_000_003, 1_000_033, 1_000_037, 1_000_039, 1_000_081, 1_000_099, 1_000_117, 1_000_121, 1_000_133,
    ];
    config.workers.participants = 2;
    crtpool::config::validator::validate_config(&config).unwrap();

    let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();
    assert_eq!(outcome.value.to_string(), "1/10007");
    assert_eq!(outcome.stats.skipped_unusable, 1);
}

#[tokio::test]
async fn partitioned_polling_pool() {
    let mut config = values_job(&["355/113", "-7/2"], 3);
    config.reconstruction.builder = BuilderKind::Rational;
    config.primes.policy = PrimePolicy::Partitioned;
    config.workers.mode = WorkerMode::Polling;

    let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();
    assert_eq!(outcome.value.to_string(), "[355/113, -7/2]");
    // Polling workers keep computing until they see the flag, so late residues are normal
    assert!(outcome.stats.residues_received() >= outcome.stats.primes_merged() as u64);
    assert_eq!(
        outcome.stats.residues_received() - outcome.stats.primes_merged() as u64,
        outcome.stats.late_discarded
    );
}

#[tokio::test]
async fn hinted_linear_solve() {
    // x = (4/5, 7/5)
    let mut config = JobConfig {
        problem: Problem::Solve {
            matrix: vec![vec![2, 1], vec![1, 3]],
            rhs: vec![3, 5],
        },
        ..JobConfig::default()
    };
    config.reconstruction.builder = BuilderKind::HintedRational;
    config.workers.participants = 2;

    let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();
    let expected: Vec<Rational> = vec!["4/5".parse().unwrap(), "7/5".parse().unwrap()];
    assert_eq!(outcome.value, Reconstructed::Rational(expected));
}

#[tokio::test]
async fn determinant_with_small_primes() {
    let mut config = JobConfig {
        problem: Problem::Determinant {
            matrix: vec![vec![4, -2, 1], vec![3, 6, -4], vec![2, 1, 8]],
        },
        ..JobConfig::default()
    };
    config.workers.participants = 2;
    config.primes.bits = 12;

    let outcome = Reconstructor::new(config).unwrap().run().await.unwrap();
    // 4·(48+4) + 2·(24+8) + (3-12)
    assert_eq!(outcome.value, integers(&[263]));
}

#[tokio::test]
async fn sequential_and_parallel_agree_byte_for_byte() {
    let primes = vec![
        2_147_483_647,
        2_147_483_629,
        2_147_483_587,
        2_147_483_579,
        2_147_483_563,
        2_147_483_549,
        2_147_483_543,
        2_147_483_497,
    ];
    let mut config = values_job(&["-31415926535897932384", "27182818284590452353"], 4);
    config.primes.source = SourceKind::Fixed;
    config.primes.list = primes;
    config.reconstruction.termination = TerminationPolicy::bound(70);

    let reconstructor = Reconstructor::new(config).unwrap();
    let sequential = reconstructor.run_sequential().unwrap();
    let parallel = reconstructor.run().await.unwrap();

    assert_eq!(sequential.value, parallel.value);
    assert_eq!(values_json(&sequential).unwrap(), values_json(&parallel).unwrap());
}

#[tokio::test]
async fn remote_workers_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(NodeService::new(0).unwrap().serve(listener));

    for policy in [PrimePolicy::Centralized, PrimePolicy::Partitioned] {
        let mut config = values_job(&["-5/3", "1/7"], 1);
        config.reconstruction.builder = BuilderKind::Rational;
        config.primes.policy = policy;

        // The same node hosts both workers
        let hosts = vec![addr.clone(), addr.clone()];
        let outcome = Reconstructor::new(config).unwrap().run_remote(&hosts).await.unwrap();
        assert_eq!(outcome.value.to_string(), "[-5/3, 1/7]");
        assert_eq!(outcome.stats.poison_pills, 2);
    }
}

#[tokio::test]
async fn remote_polling_workers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(NodeService::new(0).unwrap().serve(listener));

    let mut config = values_job(&["8675309"], 1);
    config.primes.policy = PrimePolicy::Partitioned;
    config.workers.mode = WorkerMode::Polling;

    let hosts = vec![addr.clone(), addr.clone(), addr];
    let outcome = Reconstructor::new(config).unwrap().run_remote(&hosts).await.unwrap();
    assert_eq!(outcome.value, integers(&[8_675_309]));
}

#[tokio::test]
async fn unreachable_node_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let reconstructor = Reconstructor::new(values_job(&["1"], 1)).unwrap();
    assert!(reconstructor.run_remote(&[addr]).await.is_err());
}

const PRIMES: [u64; 6] = [
    2_147_483_647,
    2_147_483_629,
    2_147_483_587,
    1_000_000_007,
    1_000_000_009,
    998_244_353,
];

fn residues(values: &[i64], p: u64) -> Vec<u64> {
    let field = PrimeField::new(p).unwrap();
    crtpool::iteration::ExactValues::from_integers(values.iter().copied())
        .evaluate(&field)
        .unwrap()
}

proptest! {
    #[test]
    fn merge_order_does_not_change_the_result(
        values in prop::collection::vec(any::<i64>(), 1..5),
        order in Just(PRIMES.to_vec()).prop_shuffle(),
    ) {
        let mut in_order = IntegerCra::new(TerminationPolicy::bound(64));
        for &p in PRIMES.iter() {
            in_order.absorb(p, &residues(&values, p)).unwrap();
        }

        let mut shuffled = IntegerCra::new(TerminationPolicy::bound(64));
        for &p in &order {
            shuffled.absorb(p, &residues(&values, p)).unwrap();
        }

        prop_assert_eq!(in_order.result().unwrap(), integers(&values));
        prop_assert_eq!(shuffled.result().unwrap(), in_order.result().unwrap());
        prop_assert_eq!(
            shuffled.accumulator().unwrap().values(),
            in_order.accumulator().unwrap().values()
        );
    }
}
