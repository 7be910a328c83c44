//! TCP transport
//!
//! One TCP connection per worker. Each connection is split into halves: the
//! write half stays with the transport and a reader task forwards decoded
//! frames into a channel, so the coordinator can "receive from any" with a
//! single `recv`.
//!
//! A reader stops after forwarding `DrainAck` (or an error report), since
//! nothing may follow it. Any earlier read failure reaches the coordinator as
//! a fatal error.

use super::protocol::*;
use super::transport::{CoordinatorTransport, WorkerId, WorkerTransport};
use crate::config::JobConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Coordinator end: one connection per worker
pub struct TcpCoordinator {
    writers: Vec<OwnedWriteHalf>,
    inbound: UnboundedReceiver<(WorkerId, Result<Message>)>,
    readers: Vec<JoinHandle<()>>,
}

impl TcpCoordinator {
    /// Connect to every host and run the CONFIG/READY handshake
    ///
    /// Worker `i` is the connection to `hosts[i]`; listing a host twice gives
    /// it two workers.
    pub async fn connect(hosts: &[String], job: &JobConfig) -> Result<Self> {
        let mut streams = Vec::with_capacity(hosts.len());
        for (worker_id, host) in hosts.iter().enumerate() {
            let mut stream = TcpStream::connect(host)
                .await
                .with_context(|| format!("Failed to connect to {}", host))?;
            stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

            let config = ConfigMessage {
                protocol_version: PROTOCOL_VERSION,
                worker_id,
                num_workers: hosts.len(),
                job: job.clone(),
            };
            write_message(&mut stream, &Message::Config(config)).await?;

            match read_message(&mut stream)
                .await
                .with_context(|| format!("Handshake with {} failed", host))?
            {
                Message::Ready(ready) => {
                    if ready.protocol_version != PROTOCOL_VERSION {
                        anyhow::bail!(
                            "Protocol version mismatch with {}: expected {}, got {}",
                            host,
                            PROTOCOL_VERSION,
                            ready.protocol_version
                        );
                    }
                    info!(worker_id, node = %ready.node_id, %host, "worker ready");
                }
                Message::Error(err) => anyhow::bail!("Node {} rejected the job: {}", host, err.error),
                other => anyhow::bail!("Expected READY from {}, got {:?}", host, other),
            }
            streams.push(stream);
        }
        Ok(Self::from_streams(streams))
    }

    /// Wrap connections that already completed the handshake
    pub fn from_streams(streams: Vec<TcpStream>) -> Self {
        let (tx, inbound) = mpsc::unbounded_channel();
        let mut writers = Vec::with_capacity(streams.len());
        let mut readers = Vec::with_capacity(streams.len());

        for (id, stream) in streams.into_iter().enumerate() {
            let (read_half, write_half) = stream.into_split();
            writers.push(write_half);
            readers.push(tokio::spawn(forward_frames(id, read_half, tx.clone())));
        }

        Self {
            writers,
            inbound,
            readers,
        }
    }
}

async fn forward_frames(
    id: WorkerId,
    mut read_half: OwnedReadHalf,
    tx: UnboundedSender<(WorkerId, Result<Message>)>,
) {
    loop {
        let result = read_message(&mut read_half).await;
        let last = match &result {
            Ok(Message::DrainAck) | Ok(Message::Error(_)) | Err(_) => true,
            Ok(_) => false,
        };
        if tx.send((id, result)).is_err() || last {
            debug!(worker_id = id, "reader finished");
            return;
        }
    }
}

impl Drop for TcpCoordinator {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

#[async_trait]
impl CoordinatorTransport for TcpCoordinator {
    fn num_workers(&self) -> usize {
        self.writers.len()
    }

    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
        let writer = self
            .writers
            .get_mut(to)
            .with_context(|| format!("No such worker: {}", to))?;
        write_message(writer, &msg)
            .await
            .with_context(|| format!("Failed to send to worker {}", to))
    }

    async fn receive_any(&mut self) -> Result<(WorkerId, Message)> {
        match self.inbound.recv().await {
            Some((id, Ok(msg))) => Ok((id, msg)),
            Some((id, Err(e))) => Err(e.context(format!("Lost connection to worker {}", id))),
            None => anyhow::bail!("All worker connections closed"),
        }
    }
}

/// Worker end of one coordinator connection
pub struct TcpWorker {
    writer: OwnedWriteHalf,
    inbound: UnboundedReceiver<Result<Message>>,
    pending: Option<Result<Message>>,
    reader: JoinHandle<()>,
}

impl TcpWorker {
    /// Wrap a connection whose handshake is complete
    pub fn new(stream: TcpStream) -> Self {
        let (mut read_half, writer) = stream.into_split();
        let (tx, inbound) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            loop {
                let result = read_message(&mut read_half).await;
                let last = matches!(result, Ok(Message::Stop) | Err(_));
                if tx.send(result).is_err() || last {
                    return;
                }
            }
        });
        Self {
            writer,
            inbound,
            pending: None,
            reader,
        }
    }
}

impl Drop for TcpWorker {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl WorkerTransport for TcpWorker {
    async fn send(&mut self, msg: Message) -> Result<()> {
        write_message(&mut self.writer, &msg).await
    }

    async fn receive(&mut self) -> Result<Message> {
        match self.pending.take() {
            Some(result) => result,
            None => self.inbound.recv().await.context("Coordinator connection closed")?,
        }
    }

    fn stop_requested(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.inbound.try_recv().ok();
        }
        // A broken connection also ends the polling loop; `receive` reports it
        matches!(self.pending, Some(Ok(Message::Stop)) | Some(Err(_)))
    }
}
