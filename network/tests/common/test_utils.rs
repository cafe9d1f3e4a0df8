// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nim network integration tests

use anyhow::{Context, Result};
use async_trait::async_trait;
use nim_core::{GameState, Move};
use nim_network::{TraceAction, TraceError, Tracer};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// What the reference peer does with one incoming move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerReply {
    Move(Move),
    /// The client sent an exhausted board; the peer has won
    Conceded,
}

/// Reference peer rules: answer the opening with the board, otherwise
/// take one item from the highest non-empty row.
pub fn reference_reply(incoming: &Move, board: Option<&[u8]>) -> PeerReply {
    if incoming.is_sentinel() {
        let rows = match board {
            Some(rows) => rows.to_vec(),
            None => vec![incoming.move_count.max(0) as u8],
        };
        return PeerReply::Move(Move::new(GameState::new(rows), -1, incoming.move_count));
    }

    let state = &incoming.game_state;
    match state.rows().iter().rposition(|&c| c > 0) {
        None => PeerReply::Conceded,
        Some(row) => {
            let next = state.take(row, 1).expect("row is positive");
            PeerReply::Move(Move::new(next, row as i8, 1))
        }
    }
}

/// Tracer that always fails
pub struct BrokenTracer;

#[async_trait]
impl Tracer for BrokenTracer {
    async fn record(&self, _action: &TraceAction) -> Result<(), TraceError> {
        Err(TraceError::Rejected {
            identity: "broken".to_string(),
            reason: "always fails".to_string(),
        })
    }
}

/// Poll a file until it holds at least `count` lines
pub async fn wait_for_lines(path: &Path, count: usize, timeout_ms: u64) -> Result<Vec<String>> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        if lines.len() >= count || Instant::now() >= deadline {
            return Ok(lines);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
