// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common utilities for Nim network integration tests

#![allow(dead_code)]

use nim_core::{decode_move, encode_move, Move};
use nim_network::{LoopOptions, MemoryTransport, RetryPolicy, Transport};
use once_cell::sync::Lazy;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Re-export utilities
pub mod test_utils;

use test_utils::{reference_reply, PeerReply};

// Initialize logging for tests
static INIT_LOGGING: Lazy<()> = Lazy::new(|| {
    // Only show warnings and errors unless RUST_LOG is explicitly set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

pub fn init_logging() {
    Lazy::force(&INIT_LOGGING);
}

/// How long a test peer waits for the client before giving up
const PEER_IDLE: Duration = Duration::from_secs(5);

/// Loop options with a short receive window
pub fn fast_options(timeout_ms: u64) -> LoopOptions {
    LoopOptions {
        retry: RetryPolicy {
            receive_timeout: Duration::from_millis(timeout_ms),
            max_lost_turns: Some(20),
        },
        ..LoopOptions::default()
    }
}

/// Scripted misbehaviour for the reference peer.
///
/// Indices count every datagram the peer receives, starting at 0.
#[derive(Debug, Clone, Default)]
pub struct PeerBehaviour {
    /// Board announced in reply to the opening; `None` uses `[seed]`
    pub board: Option<Vec<u8>>,
    /// Datagrams to ignore
    pub drop: Vec<usize>,
    /// Datagrams answered with bytes that are not a move
    pub garbage: Vec<usize>,
    /// Datagrams answered with a move whose count lies about the board
    pub cheat: Vec<usize>,
}

/// Everything the reference peer saw and said
#[derive(Debug, Clone, Default)]
pub struct PeerLog {
    pub received: Vec<Move>,
    pub sent: Vec<Move>,
}

enum Step {
    Ignore,
    Reply(Vec<u8>, bool),
    Stop,
}

fn handle(index: usize, payload: &[u8], behaviour: &PeerBehaviour, log: &mut PeerLog) -> Step {
    let Ok(incoming) = decode_move(payload) else {
        return Step::Ignore;
    };
    log.received.push(incoming.clone());

    if behaviour.drop.contains(&index) {
        return Step::Ignore;
    }
    if behaviour.garbage.contains(&index) {
        return Step::Reply(vec![0xff, 0x00, 0x13], false);
    }

    match reference_reply(&incoming, behaviour.board.as_deref()) {
        PeerReply::Conceded => Step::Stop,
        PeerReply::Move(mut reply) => {
            let finished = reply.game_state.is_exhausted();
            if behaviour.cheat.contains(&index) {
                reply.move_count = reply.move_count.saturating_add(1);
            }
            log.sent.push(reply.clone());
            let bytes = encode_move(&reply).expect("peer reply encodes");
            Step::Reply(bytes, finished)
        }
    }
}

/// Serve one game over an in-memory transport
pub fn spawn_memory_peer(mut transport: MemoryTransport, behaviour: PeerBehaviour) -> JoinHandle<PeerLog> {
    tokio::spawn(async move {
        let mut log = PeerLog::default();
        let mut index = 0;
        while let Ok(payload) = transport.receive(PEER_IDLE).await {
            let step = handle(index, &payload, &behaviour, &mut log);
            index += 1;
            match step {
                Step::Ignore => {}
                Step::Reply(bytes, finished) => {
                    let _ = transport.send(&bytes).await;
                    if finished {
                        break;
                    }
                }
                Step::Stop => break,
            }
        }
        log
    })
}

/// Serve one game on a bound UDP socket, replying to whoever wrote last
pub fn spawn_udp_peer(socket: UdpSocket, behaviour: PeerBehaviour) -> JoinHandle<PeerLog> {
    tokio::spawn(async move {
        let mut log = PeerLog::default();
        let mut index = 0;
        let mut buf = vec![0u8; 65_536];
        while let Ok(Ok((len, from))) =
            tokio::time::timeout(PEER_IDLE, socket.recv_from(&mut buf)).await
        {
            let step = handle(index, &buf[..len], &behaviour, &mut log);
            index += 1;
            match step {
                Step::Ignore => {}
                Step::Reply(bytes, finished) => {
                    let _ = socket.send_to(&bytes, from).await;
                    if finished {
                        break;
                    }
                }
                Step::Stop => break,
            }
        }
        log
    })
}
