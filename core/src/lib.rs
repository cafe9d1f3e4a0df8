// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nim Core - Game State and Move Logic
//!
//! This crate provides the core game functionality including:
//! - Row counter representation of the shared game state
//! - Move validation against the last transmitted state
//! - The client's fixed move strategy
//! - CBOR wire codec for move messages

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod cbor;
pub mod engine;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row index carried by the opening message, meaning "no move yet"
pub const SENTINEL_ROW: i8 = -1;

/// Widest board a move can address, since the row index travels as an i8
pub const MAX_ROWS: usize = i8::MAX as usize + 1;

/// Ordered sequence of per-row counters shared by both players
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameState(Vec<u8>);

impl GameState {
    /// Create a game state from explicit row counters
    pub fn new(rows: Vec<u8>) -> Self {
        Self(rows)
    }

    /// State with no rows at all, sent by the opening message
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Single-row board holding the seed value
    pub fn seeded(seed: u8) -> Self {
        Self(vec![seed])
    }

    /// Row counters, lowest index first
    pub fn rows(&self) -> &[u8] {
        &self.0
    }

    /// Counter for a row, if it exists
    pub fn get(&self, row: usize) -> Option<u8> {
        self.0.get(row).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every row index fits in a move's row field
    pub fn is_addressable(&self) -> bool {
        self.0.len() <= MAX_ROWS
    }

    /// Sum of all counters
    pub fn total(&self) -> u32 {
        self.0.iter().map(|&c| u32::from(c)).sum()
    }

    /// True when the board has rows and every one of them is zero.
    ///
    /// An empty state is not exhausted: it only occurs before the peer
    /// has announced a board.
    pub fn is_exhausted(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&c| c == 0)
    }

    /// Copy of this state with `count` taken from `row`, or `None` if the
    /// row does not exist or holds fewer than `count`
    pub fn take(&self, row: usize, count: u8) -> Option<GameState> {
        let current = self.get(row)?;
        let remaining = current.checked_sub(count)?;
        let mut rows = self.0.clone();
        rows[row] = remaining;
        Some(GameState(rows))
    }
}

impl From<Vec<u8>> for GameState {
    fn from(rows: Vec<u8>) -> Self {
        Self(rows)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// One message of the exchange: the row touched, the amount taken and
/// the full board that results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Move {
    /// Board after the move was applied
    pub game_state: GameState,
    /// Row index, or [`SENTINEL_ROW`] for the opening message
    pub move_row: i8,
    /// Amount taken from the row (the seed for the opening message)
    pub move_count: i8,
}

impl Move {
    pub fn new(game_state: GameState, move_row: i8, move_count: i8) -> Self {
        Self {
            game_state,
            move_row,
            move_count,
        }
    }

    /// Opening message that carries the seed in place of a real move
    pub fn opening(seed: i8, opening: OpeningState) -> Self {
        let game_state = match opening {
            OpeningState::Empty => GameState::empty(),
            // Negative seeds cannot describe a row; the board stays empty
            OpeningState::Seeded => u8::try_from(seed)
                .map(GameState::seeded)
                .unwrap_or_default(),
        };
        Self::new(game_state, SENTINEL_ROW, seed)
    }

    /// Whether this is the "no prior move" message
    pub fn is_sentinel(&self) -> bool {
        self.move_row == SENTINEL_ROW
    }
}

/// Payload of the client's opening message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpeningState {
    /// No rows; the peer decides the board from the seed
    #[default]
    Empty,
    /// A single row holding the seed
    Seeded,
}

/// Which side won the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    /// This process
    Client,
    /// The remote peer
    Server,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Client => "client",
            Winner::Server => "server",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Re-exports for convenience
pub use cbor::{decode_move, encode_move, DecodeError, EncodeError};
pub use engine::{next_move, FirstRowStrategy, MoveStrategy};
pub use rules::{states_equal, validate_move, ProtocolViolation};
