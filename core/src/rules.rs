// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move validation against the last transmitted state

use crate::{GameState, Move};
use thiserror::Error;

/// Reasons a peer's claimed move does not follow from our last state
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The claimed row does not exist on the board
    #[error("Row {row} is outside a board of {rows} rows")]
    RowOutOfRange { row: i8, rows: usize },

    /// A move has to take at least one item
    #[error("Move count {count} is not positive")]
    NonPositiveCount { count: i8 },

    /// The row holds fewer items than the move takes
    #[error("Row {row} holds {available}, cannot take {count}")]
    Underflow { row: usize, available: u8, count: i8 },

    /// The claimed board has a different number of rows
    #[error("Claimed board has {claimed} rows, expected {expected}")]
    LengthMismatch { expected: usize, claimed: usize },

    /// The claimed board is not our board with the move applied
    #[error("Claimed board {claimed} does not match expected {expected}")]
    StateMismatch {
        expected: GameState,
        claimed: GameState,
    },
}

/// Element-wise comparison of two boards
pub fn states_equal(a: &GameState, b: &GameState) -> bool {
    let (a, b) = (a.rows(), b.rows());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Check that `incoming` is `last_sent` with `move_count` taken from
/// `move_row` and nothing else changed.
///
/// Callers must not pass the opening (sentinel) message: it carries no
/// move to check.
pub fn validate_move(last_sent: &GameState, incoming: &Move) -> Result<(), ProtocolViolation> {
    let row = usize::try_from(incoming.move_row)
        .ok()
        .filter(|&r| r < last_sent.len())
        .ok_or(ProtocolViolation::RowOutOfRange {
            row: incoming.move_row,
            rows: last_sent.len(),
        })?;

    let count = u8::try_from(incoming.move_count)
        .ok()
        .filter(|&c| c > 0)
        .ok_or(ProtocolViolation::NonPositiveCount {
            count: incoming.move_count,
        })?;

    if incoming.game_state.len() != last_sent.len() {
        return Err(ProtocolViolation::LengthMismatch {
            expected: last_sent.len(),
            claimed: incoming.game_state.len(),
        });
    }

    let expected = last_sent.take(row, count).ok_or(ProtocolViolation::Underflow {
        row,
        available: last_sent.get(row).unwrap_or(0),
        count: incoming.move_count,
    })?;

    if !states_equal(&expected, &incoming.game_state) {
        return Err(ProtocolViolation::StateMismatch {
            expected,
            claimed: incoming.game_state.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: &[u8]) -> GameState {
        GameState::new(rows.to_vec())
    }

    #[test]
    fn test_states_equal_is_elementwise() {
        assert!(states_equal(&board(&[1, 2, 3]), &board(&[1, 2, 3])));
        assert!(!states_equal(&board(&[1, 2, 3]), &board(&[1, 2, 4])));
        assert!(!states_equal(&board(&[1, 2]), &board(&[1, 2, 0])));
        assert!(states_equal(&GameState::empty(), &GameState::empty()));
    }

    #[test]
    fn test_legal_move_passes() {
        let last = board(&[3, 4, 5]);
        let mv = Move::new(board(&[3, 1, 5]), 1, 3);
        assert_eq!(validate_move(&last, &mv), Ok(()));
    }

    #[test]
    fn test_taking_a_whole_row_passes() {
        let last = board(&[0, 4]);
        let mv = Move::new(board(&[0, 0]), 1, 4);
        assert!(validate_move(&last, &mv).is_ok());
    }

    #[test]
    fn test_wrong_row_changed() {
        let last = board(&[3, 4]);
        let mv = Move::new(board(&[2, 4]), 1, 1);
        assert!(matches!(
            validate_move(&last, &mv),
            Err(ProtocolViolation::StateMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_amount() {
        let last = board(&[3, 4]);
        let mv = Move::new(board(&[3, 2]), 1, 1);
        assert!(matches!(
            validate_move(&last, &mv),
            Err(ProtocolViolation::StateMismatch { .. })
        ));
    }

    #[test]
    fn test_underflow() {
        let last = board(&[1, 4]);
        let mv = Move::new(board(&[0, 4]), 0, 2);
        assert_eq!(
            validate_move(&last, &mv),
            Err(ProtocolViolation::Underflow {
                row: 0,
                available: 1,
                count: 2
            })
        );
    }

    #[test]
    fn test_row_out_of_range() {
        let last = board(&[1, 4]);
        for row in [2, 100, -2] {
            let mv = Move::new(board(&[1, 4]), row, 1);
            assert!(matches!(
                validate_move(&last, &mv),
                Err(ProtocolViolation::RowOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_zero_and_negative_counts() {
        let last = board(&[1, 4]);
        for count in [0, -1] {
            let mv = Move::new(board(&[1, 4]), 0, count);
            assert_eq!(
                validate_move(&last, &mv),
                Err(ProtocolViolation::NonPositiveCount { count })
            );
        }
    }

    #[test]
    fn test_length_mismatch() {
        let last = board(&[1, 4]);
        let mv = Move::new(board(&[0, 4, 0]), 0, 1);
        assert_eq!(
            validate_move(&last, &mv),
            Err(ProtocolViolation::LengthMismatch {
                expected: 2,
                claimed: 3
            })
        );
    }
}
