// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded trace server
//!
//! Accepts tracer connections in a background task and appends every
//! record it receives to a JSON-lines file. Shares nothing with the game
//! loop besides the process.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TracingServerConfig;
use crate::tracer::{Hello, TraceError, TraceRecord};

/// Listening trace server, not yet accepting
pub struct TraceServer {
    listener: TcpListener,
    secret: Arc<Vec<u8>>,
    sink: Arc<Mutex<File>>,
    output: PathBuf,
}

impl TraceServer {
    /// Bind the listener and open the output file for appending
    pub async fn open(config: &TracingServerConfig) -> Result<Self, TraceError> {
        let listener = TcpListener::bind(&config.server_bind).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.output_file)
            .await?;

        info!(
            bind = %listener.local_addr()?,
            output = %config.output_file.display(),
            "Trace server open"
        );

        Ok(Self {
            listener,
            secret: Arc::new(config.secret.clone()),
            sink: Arc::new(Mutex::new(file)),
            output: config.output_file.clone(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Run the accept loop as a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.accept_loop())
    }

    async fn accept_loop(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let secret = Arc::clone(&self.secret);
                    let sink = Arc::clone(&self.sink);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &secret, &sink).await {
                            warn!(%peer, "Trace connection ended: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Trace server accept failed: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    secret: &[u8],
    sink: &Mutex<File>,
) -> Result<(), TraceError> {
    let mut lines = BufReader::new(stream).lines();

    let Some(first) = lines.next_line().await? else {
        return Ok(());
    };
    let hello: Hello = serde_json::from_str(&first)?;
    if hello.secret != secret {
        return Err(TraceError::Rejected {
            identity: hello.identity,
            reason: "secret mismatch".to_string(),
        });
    }
    debug!(identity = %hello.identity, "Tracer connected");

    let mut stored = 0usize;
    while let Some(line) = lines.next_line().await? {
        let record: TraceRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(identity = %hello.identity, "Skipping malformed trace record: {}", e);
                continue;
            }
        };

        // Records are stored under the identity from the hello
        if record.identity != hello.identity {
            warn!(
                expected = %hello.identity,
                got = %record.identity,
                "Skipping record with foreign identity"
            );
            continue;
        }

        let mut out = serde_json::to_vec(&record)?;
        out.push(b'\n');
        let mut file = sink.lock().await;
        file.write_all(&out).await?;
        file.flush().await?;
        stored += 1;
    }

    debug!(identity = %hello.identity, stored, "Tracer disconnected");
    Ok(())
}
