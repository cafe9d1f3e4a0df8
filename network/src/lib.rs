// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nim Network - UDP move exchange for the Nim client
//!
//! This crate provides the networking functionality including:
//! - A point-to-point datagram transport with bounded receive waits
//! - The move exchange state machine that plays one game
//! - Game event recording and an embedded trace server
//! - JSON configuration loading

#![deny(unsafe_code)]

pub mod config;
pub mod game_channel;
pub mod trace_server;
pub mod tracer;
pub mod transport;

// Re-exports
pub use config::{ClientConfig, ConfigError, TracingServerConfig};
pub use game_channel::{
    GameLoop, GameLoopError, GameOutcome, GameReport, GameStats, LoopOptions, Phase, RetryPolicy,
};
pub use trace_server::TraceServer;
pub use tracer::{LogTracer, MemoryTracer, RemoteTracer, TraceAction, TraceError, Tracer};
#[cfg(feature = "stub")]
pub use transport::MemoryTransport;
pub use transport::{AddressError, Transport, TransportError, UdpChannel};
