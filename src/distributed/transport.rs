//! Transport seam between the protocol state machines and the wire
//!
//! The coordinator and worker loops are written once against these traits.
//! [`local`](super::local) moves messages over in-process channels and
//! [`tcp`](super::tcp) over framed TCP connections.

use super::protocol::Message;
use anyhow::Result;
use async_trait::async_trait;

/// Worker identity, `0..num_workers`
pub type WorkerId = usize;

/// Coordinator side of a transport
#[async_trait]
pub trait CoordinatorTransport: Send {
    /// Size of the worker pool
    fn num_workers(&self) -> usize;

    /// Point-to-point send
    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()>;

    /// Next message from any worker, in arrival order
    ///
    /// Losing the connection to a worker surfaces here as an error.
    async fn receive_any(&mut self) -> Result<(WorkerId, Message)>;

    /// Set the cooperative one-sided stop flag
    ///
    /// Transports without shared state may leave this a no-op; polling workers
    /// then observe the pending `Stop` message instead.
    fn raise_stop_flag(&mut self) {}
}

/// Worker side of a transport
#[async_trait]
pub trait WorkerTransport: Send {
    async fn send(&mut self, msg: Message) -> Result<()>;

    /// Next message from the coordinator
    async fn receive(&mut self) -> Result<Message>;

    /// Non-blocking check of the stop flag or a pending `Stop`
    fn stop_requested(&mut self) -> bool;
}
