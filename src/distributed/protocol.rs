//! Coordinator/worker protocol
//!
//! Messages between the coordinator and its workers. Over TCP they are
//! serialized with MessagePack (rmp-serde); the in-process transport moves the
//! same [`Message`] values through channels unchanged.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |-------- CONFIG ------------->|   (TCP only)
//!     |<------- READY ---------------|
//!     |                              |
//!     |-------- ASSIGN(p) ---------->|   centralized
//!     |<------- RESIDUE(p, r) -------|
//!     |-------- ASSIGN(p') --------->|
//!     |            ...               |
//!     |<------- RESIDUE(p', r') -----|
//!     |-------- STOP --------------->|   poison pill
//!     |<------- DRAIN_ACK -----------|
//! ```
//!
//! Partitioned workers receive `CONTINUE` instead of `ASSIGN` and draw the
//! prime themselves; polling workers receive nothing until `STOP`.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::config::JobConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and workers must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Job configuration (Coordinator → Worker)
    ///
    /// First message on a TCP connection. Carries everything the worker needs
    /// to rebuild the iteration and, when partitioned, its own prime stream.
    Config(ConfigMessage),

    /// Handshake reply (Worker → Coordinator)
    Ready(ReadyMessage),

    /// Compute at this prime (Coordinator → Worker, centralized policy)
    Assign(u64),

    /// Compute at your next prime (Coordinator → Worker, partitioned paced mode)
    Continue,

    /// Poison pill (Coordinator → Worker)
    ///
    /// Sent exactly once per worker. The worker answers with `DrainAck`
    /// (unless it already did) and exits.
    Stop,

    /// Residue computed at a prime (Worker → Coordinator)
    Residue(ResidueMessage),

    /// Final drain acknowledgment (Worker → Coordinator)
    ///
    /// The last message a worker ever sends.
    DrainAck,

    /// Iteration or protocol failure (Worker → Coordinator)
    ///
    /// Coordinator aborts the run and reports the error.
    Error(ErrorMessage),
}

/// Configuration message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Identity of the receiving worker, `0..num_workers`
    pub worker_id: usize,

    /// Size of the worker pool
    pub num_workers: usize,

    /// Complete job configuration
    pub job: JobConfig,
}

/// Ready message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyMessage {
    /// Protocol version
    pub protocol_version: u32,

    /// Node identifier (hostname)
    pub node_id: String,

    /// Echo of the assigned worker identity
    pub worker_id: usize,
}

/// Residue tagged with the prime that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueMessage {
    pub prime: u64,
    pub values: Vec<u64>,
}

/// Error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Reporting worker
    pub worker_id: usize,

    /// Node identifier
    pub node_id: String,

    /// Error description
    pub error: String,
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    // Named fields keep internally tagged enums and serde defaults decodable
    let msg_bytes = rmp_serde::to_vec_named(msg).context("Failed to serialize message")?;

    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize a message from bytes
///
/// Returns (message, bytes_consumed) where bytes_consumed includes the length prefix.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    if buf.len() < 4 {
        anyhow::bail!("Buffer too small for message length (need 4 bytes, got {})", buf.len());
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if buf.len() < 4 + msg_len {
        anyhow::bail!("Incomplete message (need {} bytes, got {})", 4 + msg_len, buf.len());
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len]).context("Failed to deserialize message")?;

    Ok((msg, 4 + msg_len))
}

/// Read one framed message from any async reader (a stream or a split read half)
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_SIZE {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_len);
    }

    // Keep the prefix so the frame decodes like any serialized buffer
    let mut frame = vec![0u8; 4 + msg_len];
    frame[..4].copy_from_slice(&len_buf);
    reader
        .read_exact(&mut frame[4..])
        .await
        .context("Failed to read message body")?;

    let (msg, _) = deserialize_message(&frame)?;

    Ok(msg)
}

/// Write one framed message and flush it
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let framed = serialize_message(msg)?;

    writer.write_all(&framed).await.context("Failed to write message")?;
    writer.flush().await.context("Failed to flush stream")?;

    Ok(())
}
