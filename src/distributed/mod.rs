//! Distributed reconstruction
//!
//! # Architecture
//!
//! One coordinator owns the reconstruction state and a pool of workers
//! computes residues:
//!
//! - **Coordinator**: assigns primes (or lets workers draw their own), merges
//!   residues in arrival order, poisons every worker once the result is stable
//! - **Workers**: evaluate the iteration at one prime at a time
//! - **Node service**: hosts workers on remote machines over TCP
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `transport`: the seam between the state machines and the wire
//! - `local`: in-process transport
//! - `tcp`: TCP transport
//! - `coordinator`, `worker`: the two state machines
//! - `node_service`: remote worker host

pub mod coordinator;
pub mod local;
pub mod node_service;
pub mod protocol;
pub mod tcp;
pub mod transport;
pub mod worker;

pub use coordinator::{Coordinator, Phase};
pub use local::{local_pool, LocalCoordinator, LocalWorker};
pub use node_service::NodeService;
pub use protocol::{ConfigMessage, ErrorMessage, Message, ReadyMessage, ResidueMessage, PROTOCOL_VERSION};
pub use tcp::{TcpCoordinator, TcpWorker};
pub use transport::{CoordinatorTransport, WorkerId, WorkerTransport};
pub use worker::{Worker, WorkerMode};
