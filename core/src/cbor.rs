// SPDX-License-Identifier: MIT OR Apache-2.0

//! CBOR wire codec for move messages
//!
//! Every datagram carries exactly one CBOR document: a map with the keys
//! `GameState`, `MoveRow` and `MoveCount`. The counter array is variable
//! length, so no framing beyond the datagram boundary is needed.

use crate::Move;
use thiserror::Error;

/// Largest payload that fits in a single UDP datagram over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Failure to turn a received payload back into a [`Move`]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The datagram carried no bytes
    #[error("Empty payload")]
    Empty,

    /// Truncated, malformed or trailing data
    #[error("Malformed move message: {0}")]
    Malformed(#[from] serde_cbor::Error),
}

/// Failure to serialize an outgoing [`Move`]
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to serialize move: {0}")]
    Serialize(#[from] serde_cbor::Error),

    /// Encoded message would not fit in one datagram
    #[error("Encoded move is {size} bytes, limit is {MAX_DATAGRAM_SIZE}")]
    TooLarge { size: usize },
}

/// Serialize a move to a single datagram payload
pub fn encode_move(mv: &Move) -> Result<Vec<u8>, EncodeError> {
    let bytes = serde_cbor::to_vec(mv)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(EncodeError::TooLarge { size: bytes.len() });
    }
    Ok(bytes)
}

/// Deserialize a datagram payload into a move
pub fn decode_move(data: &[u8]) -> Result<Move, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    match serde_cbor::from_slice(data) {
        Ok(mv) => Ok(mv),
        Err(err) => {
            tracing::debug!(len = data.len(), "Failed to decode move message: {}", err);
            Err(DecodeError::Malformed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameState, OpeningState};

    #[test]
    fn test_opening_message_roundtrip() {
        let mv = Move::opening(7, OpeningState::Empty);
        let bytes = encode_move(&mv).unwrap();
        assert_eq!(decode_move(&bytes).unwrap(), mv);
    }

    #[test]
    fn test_empty_payload_is_an_error() {
        assert!(matches!(decode_move(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_every_truncation_fails() {
        let mv = Move::new(GameState::new(vec![4, 0, 9]), 1, 2);
        let bytes = encode_move(&mv).unwrap();

        for cut in 1..bytes.len() {
            assert!(
                decode_move(&bytes[..cut]).is_err(),
                "prefix of {} bytes decoded",
                cut
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mv = Move::new(GameState::new(vec![1]), 0, 1);
        let mut bytes = encode_move(&mv).unwrap();
        bytes.push(0x00);
        assert!(matches!(decode_move(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        // A bare CBOR integer is valid CBOR but not a move message
        let bytes = serde_cbor::to_vec(&42u32).unwrap();
        assert!(decode_move(&bytes).is_err());
    }

    #[test]
    fn test_counter_out_of_range_rejected() {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Wide {
            game_state: Vec<u16>,
            move_row: i8,
            move_count: i8,
        }

        let bytes = serde_cbor::to_vec(&Wide {
            game_state: vec![300],
            move_row: 0,
            move_count: 1,
        })
        .unwrap();
        assert!(decode_move(&bytes).is_err());
    }
}
