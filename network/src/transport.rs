// SPDX-License-Identifier: MIT OR Apache-2.0

//! Point-to-point datagram transport
//!
//! A transport is bound to a single peer for its whole lifetime. It never
//! retransmits on its own: a dropped datagram surfaces to the caller as a
//! receive timeout and the caller decides what to resend.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Largest UDP payload either address family can deliver (IPv6 allows
/// more than the IPv4 limit the encoder enforces)
pub const RECV_BUFFER_SIZE: usize = 65_535;

/// Errors raised while moving datagrams
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing arrived inside the wait window
    #[error("No datagram received within {0:?}")]
    Timeout(Duration),

    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
}

/// Errors while resolving or binding the configured addresses
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Cannot resolve address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Address {0} resolved to no usable endpoint")]
    NoEndpoint(String),

    #[error("Cannot bind local address {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Cannot dial peer {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// One best-effort datagram link to a single peer
#[async_trait]
pub trait Transport: Send {
    /// Transmit one datagram to the peer
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for one datagram from the peer
    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Resolve `addr` to every candidate socket address
async fn resolve_all(addr: &str) -> Result<Vec<SocketAddr>, AddressError> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|source| AddressError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(AddressError::NoEndpoint(addr.to_string()));
    }
    Ok(candidates)
}

/// Resolve `addr` to a single socket address
pub async fn resolve(addr: &str) -> Result<SocketAddr, AddressError> {
    let candidates = resolve_all(addr).await?;
    Ok(candidates[0])
}

/// UDP socket connected to exactly one peer
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
    buf: Vec<u8>,
}

impl UdpChannel {
    /// Bind `local` and connect to `peer`.
    ///
    /// When the local address resolves to several endpoints, the first one
    /// in the peer's address family is used.
    pub async fn connect(local: &str, peer: &str) -> Result<Self, AddressError> {
        let peer_addr = resolve(peer).await?;
        let local_candidates = resolve_all(local).await?;
        let local_addr = local_candidates
            .iter()
            .copied()
            .find(|a| a.is_ipv4() == peer_addr.is_ipv4())
            .unwrap_or(local_candidates[0]);

        let socket = UdpSocket::bind(local_addr)
            .await
            .map_err(|source| AddressError::Bind {
                addr: local_addr,
                source,
            })?;
        socket
            .connect(peer_addr)
            .await
            .map_err(|source| AddressError::Connect {
                addr: peer_addr,
                source,
            })?;

        info!(
            local = %socket.local_addr().unwrap_or(local_addr),
            peer = %peer_addr,
            "UDP channel ready"
        );

        Ok(Self {
            socket,
            peer: peer_addr,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Transport for UdpChannel {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send(payload).await?;
        debug!(bytes = sent, peer = %self.peer, "Sent datagram");
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.socket.recv(&mut self.buf)).await {
                Err(_) => return Err(TransportError::Timeout(timeout)),
                Ok(Ok(len)) => {
                    debug!(bytes = len, peer = %self.peer, "Received datagram");
                    return Ok(self.buf[..len].to_vec());
                }
                // ICMP port unreachable from an earlier send; the peer may
                // still come up before the deadline
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    debug!(peer = %self.peer, "Peer port unreachable, still waiting");
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[cfg(feature = "stub")]
pub use memory::MemoryTransport;

#[cfg(feature = "stub")]
mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// In-process transport backed by a pair of channels
    pub struct MemoryTransport {
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    impl MemoryTransport {
        /// Two endpoints wired to each other
        pub fn pair() -> (Self, Self) {
            let (a_tx, b_rx) = mpsc::unbounded_channel();
            let (b_tx, a_rx) = mpsc::unbounded_channel();
            (
                Self { tx: a_tx, rx: a_rx },
                Self { tx: b_tx, rx: b_rx },
            )
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            // A vanished peer swallows datagrams, like a real network
            if self.tx.send(payload.to_vec()).is_err() {
                debug!("Memory peer gone, datagram dropped");
            }
            Ok(())
        }

        async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(Some(payload)) => Ok(payload),
                Ok(None) => {
                    tokio::time::sleep(timeout).await;
                    Err(TransportError::Timeout(timeout))
                }
                Err(_) => Err(TransportError::Timeout(timeout)),
            }
        }
    }
}
