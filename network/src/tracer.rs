// SPDX-License-Identifier: MIT OR Apache-2.0

//! Game event recording
//!
//! The game loop reports four kinds of events: game start, each move it
//! sends, each move it receives, and the final winner. Recorders are
//! append-only and their failures never affect the game.

use async_trait::async_trait;
use nim_core::{Move, Winner};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::config::base64_bytes;

/// Bound on connecting to the trace server and on writing one record
pub const DEFAULT_TRACE_TIMEOUT: Duration = Duration::from_secs(1);

/// An event in the life of one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Action")]
pub enum TraceAction {
    GameStart {
        #[serde(rename = "Seed")]
        seed: i8,
    },
    ClientMove(Move),
    ServerMoveReceive(Move),
    GameComplete {
        #[serde(rename = "Winner")]
        winner: Winner,
    },
}

/// First line a tracer sends after connecting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub identity: String,
    #[serde(with = "base64_bytes")]
    pub secret: Vec<u8>,
}

/// One recorded event as it travels to, and is stored by, the trace server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub identity: String,
    pub trace_id: Uuid,
    /// Logical clock, strictly increasing per tracer
    pub clock: u64,
    pub action: TraceAction,
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Trace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode trace record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Trace client {identity} rejected: {reason}")]
    Rejected { identity: String, reason: String },

    #[error("Trace server did not respond within {0:?}")]
    Timeout(Duration),

    /// An earlier write timed out; the stream may hold a partial line
    #[error("Trace stream stalled, record dropped")]
    Stalled,
}

/// Append-only sink for game events
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn record(&self, action: &TraceAction) -> Result<(), TraceError>;
}

/// Streams records to a trace server as JSON lines over TCP
pub struct RemoteTracer {
    identity: String,
    trace_id: Uuid,
    clock: AtomicU64,
    timeout: Duration,
    stalled: AtomicBool,
    writer: tokio::sync::Mutex<BufWriter<TcpStream>>,
}

impl RemoteTracer {
    /// Connect to `addr` and introduce ourselves
    pub async fn connect(addr: &str, identity: &str, secret: &[u8]) -> Result<Self, TraceError> {
        Self::connect_with_timeout(addr, identity, secret, DEFAULT_TRACE_TIMEOUT).await
    }

    /// Like [`RemoteTracer::connect`], with `timeout` bounding the connect
    /// and every later record write
    pub async fn connect_with_timeout(
        addr: &str,
        identity: &str,
        secret: &[u8],
        timeout: Duration,
    ) -> Result<Self, TraceError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TraceError::Timeout(timeout))??;
        let mut writer = BufWriter::new(stream);

        let hello = Hello {
            identity: identity.to_string(),
            secret: secret.to_vec(),
        };
        tokio::time::timeout(timeout, write_line(&mut writer, &hello))
            .await
            .map_err(|_| TraceError::Timeout(timeout))??;

        let trace_id = Uuid::new_v4();
        tracing::info!(%addr, %identity, %trace_id, "Connected to trace server");

        Ok(Self {
            identity: identity.to_string(),
            trace_id,
            clock: AtomicU64::new(0),
            timeout,
            stalled: AtomicBool::new(false),
            writer: tokio::sync::Mutex::new(writer),
        })
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }
}

#[async_trait]
impl Tracer for RemoteTracer {
    async fn record(&self, action: &TraceAction) -> Result<(), TraceError> {
        if self.stalled.load(Ordering::SeqCst) {
            return Err(TraceError::Stalled);
        }

        let mut writer = self.writer.lock().await;
        let record = TraceRecord {
            identity: self.identity.clone(),
            trace_id: self.trace_id,
            clock: self.clock.fetch_add(1, Ordering::SeqCst) + 1,
            action: action.clone(),
        };
        match tokio::time::timeout(self.timeout, write_line(&mut *writer, &record)).await {
            Ok(result) => result,
            Err(_) => {
                self.stalled.store(true, Ordering::SeqCst);
                tracing::warn!(
                    identity = %self.identity,
                    timeout = ?self.timeout,
                    "Trace server stopped reading, dropping further records"
                );
                Err(TraceError::Timeout(self.timeout))
            }
        }
    }
}

async fn write_line<T: Serialize>(
    writer: &mut BufWriter<TcpStream>,
    value: &T,
) -> Result<(), TraceError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Mirrors events into the diagnostic log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

#[async_trait]
impl Tracer for LogTracer {
    async fn record(&self, action: &TraceAction) -> Result<(), TraceError> {
        tracing::info!(target: "nim::trace", ?action, "Game event");
        Ok(())
    }
}

/// Keeps events in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryTracer {
    actions: Arc<Mutex<Vec<TraceAction>>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn actions(&self) -> Vec<TraceAction> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl Tracer for MemoryTracer {
    async fn record(&self, action: &TraceAction) -> Result<(), TraceError> {
        self.actions.lock().push(action.clone());
        Ok(())
    }
}
