//! Node service for distributed mode
//!
//! Runs on each remote node. Every coordinator connection hosts one worker:
//! - Receive the job configuration (CONFIG)
//! - Rebuild the iteration and, when partitioned, this worker's prime stream
//! - Reply READY, then run the worker loop until its poison pill
//!
//! Connections are independent, so one node may host several workers of the
//! same run when the coordinator lists it more than once.

use super::protocol::*;
use super::tcp::TcpWorker;
use crate::engine::PreparedJob;
use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Node service
pub struct NodeService {
    /// Port to listen on
    listen_port: u16,

    /// Node identifier (hostname)
    node_id: String,
}

impl NodeService {
    pub fn new(listen_port: u16) -> Result<Self> {
        Ok(Self {
            listen_port,
            node_id: get_node_id()?,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Bind `0.0.0.0:<listen_port>` and serve forever
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind node service on {}", addr))?;
        self.serve(listener).await
    }

    /// Serve coordinator connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(
            node = %self.node_id,
            addr = %listener.local_addr().context("Listener has no local address")?,
            "node service listening"
        );

        loop {
            let (stream, peer) = listener.accept().await.context("Failed to accept connection")?;
            info!(%peer, "coordinator connected");

            let node_id = self.node_id.clone();
            tokio::spawn(async move {
                match handle_connection(node_id, stream).await {
                    Ok(()) => info!(%peer, "worker finished"),
                    Err(e) => warn!(%peer, error = format!("{:#}", e), "worker failed"),
                }
            });
        }
    }
}

/// Handshake, then run one worker over the connection
async fn handle_connection(node_id: String, mut stream: TcpStream) -> Result<()> {
    stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

    let config = match read_message(&mut stream).await.context("Failed to read CONFIG")? {
        Message::Config(config) => config,
        other => anyhow::bail!("Expected CONFIG, got {:?}", other),
    };

    if config.protocol_version != PROTOCOL_VERSION {
        let error = format!(
            "Protocol version mismatch: node speaks {}, coordinator sent {}",
            PROTOCOL_VERSION, config.protocol_version
        );
        reject(&mut stream, &node_id, config.worker_id, &error).await;
        anyhow::bail!(error);
    }

    let job = match PreparedJob::from_config(config.job) {
        Ok(job) => job,
        Err(e) => {
            reject(&mut stream, &node_id, config.worker_id, &format!("{:#}", e)).await;
            return Err(e);
        }
    };

    let ready = ReadyMessage {
        protocol_version: PROTOCOL_VERSION,
        node_id: node_id.clone(),
        worker_id: config.worker_id,
    };
    write_message(&mut stream, &Message::Ready(ready)).await?;
    info!(worker = config.worker_id, of = config.num_workers, problem = job.problem_name(), "job accepted");

    let worker = job.worker(config.worker_id, node_id, TcpWorker::new(stream), config.num_workers);
    let stats = worker.run().await?;
    info!(
        worker = stats.worker_id,
        residues = stats.residues_sent,
        compute_ms = stats.compute_time.as_millis() as u64,
        "worker drained"
    );
    Ok(())
}

async fn reject(stream: &mut TcpStream, node_id: &str, worker_id: usize, error: &str) {
    let msg = Message::Error(ErrorMessage {
        worker_id,
        node_id: node_id.to_string(),
        error: error.to_string(),
    });
    if let Err(e) = write_message(stream, &msg).await {
        warn!(error = %e, "failed to send rejection");
    }
}

/// Get node identifier (hostname)
fn get_node_id() -> Result<String> {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(hostname)
}
