//! In-process transport
//!
//! Workers run as tokio tasks in the coordinator's process. Every worker
//! sends into one shared inbound channel tagged with its identity, and the
//! coordinator holds one outbound channel per worker. The cooperative stop
//! flag is a shared `AtomicBool`.

use super::protocol::Message;
use super::transport::{CoordinatorTransport, WorkerId, WorkerTransport};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Coordinator end of an in-process pool
#[derive(Debug)]
pub struct LocalCoordinator {
    inbound: UnboundedReceiver<(WorkerId, Message)>,
    outbound: Vec<UnboundedSender<Message>>,
    stop_flag: Arc<AtomicBool>,
}

/// Worker end of an in-process pool
#[derive(Debug)]
pub struct LocalWorker {
    id: WorkerId,
    to_coordinator: UnboundedSender<(WorkerId, Message)>,
    inbound: UnboundedReceiver<Message>,
    pending: Option<Message>,
    stop_flag: Arc<AtomicBool>,
}

/// Build a coordinator end and `num_workers` worker ends wired to it
pub fn local_pool(num_workers: usize) -> (LocalCoordinator, Vec<LocalWorker>) {
    let (to_coordinator, inbound) = mpsc::unbounded_channel();
    let stop_flag = Arc::new(AtomicBool::new(false));

    let mut outbound = Vec::with_capacity(num_workers);
    let mut workers = Vec::with_capacity(num_workers);
    for id in 0..num_workers {
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.push(tx);
        workers.push(LocalWorker {
            id,
            to_coordinator: to_coordinator.clone(),
            inbound: rx,
            pending: None,
            stop_flag: Arc::clone(&stop_flag),
        });
    }

    let coordinator = LocalCoordinator {
        inbound,
        outbound,
        stop_flag,
    };
    (coordinator, workers)
}

impl LocalWorker {
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

#[async_trait]
impl CoordinatorTransport for LocalCoordinator {
    fn num_workers(&self) -> usize {
        self.outbound.len()
    }

    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
        self.outbound
            .get(to)
            .with_context(|| format!("No such worker: {}", to))?
            .send(msg)
            .map_err(|_| anyhow!("Worker {} disconnected", to))
    }

    async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
        self.inbound
            .recv()
            .await
            .context("All workers disconnected")
    }

    fn raise_stop_flag(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

#[async_trait]
impl WorkerTransport for LocalWorker {
    async fn send(&mut self, msg: Message) -> Result<()> {
        self.to_coordinator
            .send((self.id, msg))
            .map_err(|_| anyhow!("Coordinator disconnected"))
    }

    async fn receive(&mut self) -> Result<Message> {
        if let Some(msg) = self.pending.take() {
            return Ok(msg);
        }
        self.inbound.recv().await.context("Coordinator disconnected")
    }

    fn stop_requested(&mut self) -> bool {
        if self.stop_flag.load(Ordering::Acquire) {
            return true;
        }
        if self.pending.is_none() {
            self.pending = self.inbound.try_recv().ok();
        }
        matches!(self.pending, Some(Message::Stop))
    }
}
