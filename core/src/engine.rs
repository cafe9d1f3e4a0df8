// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move selection for the local player

use crate::{GameState, Move};

/// Source of the local player's moves
pub trait MoveStrategy {
    /// Pick the next move for `state`, or `None` when no row has
    /// anything left to take. `state` must be addressable
    /// ([`GameState::is_addressable`]).
    fn next_move(&mut self, state: &GameState) -> Option<Move>;
}

/// Always takes one item from the lowest-indexed non-empty row
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRowStrategy;

impl MoveStrategy for FirstRowStrategy {
    fn next_move(&mut self, state: &GameState) -> Option<Move> {
        next_move(state)
    }
}

/// Take one item from the first positive row.
///
/// Returns `None` if every row is zero or the board has no rows. Also
/// `None` when the first positive row lies past [`crate::MAX_ROWS`], so
/// callers reject unaddressable boards before asking for a move.
pub fn next_move(state: &GameState) -> Option<Move> {
    let (row, _) = state
        .rows()
        .iter()
        .enumerate()
        .find(|&(_, &count)| count > 0)?;

    let move_row = i8::try_from(row).ok()?;
    let next = state.take(row, 1)?;
    Some(Move::new(next, move_row, 1))
}
