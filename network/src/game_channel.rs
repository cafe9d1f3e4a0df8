// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move exchange state machine
//!
//! The loop alternates strictly: send one move, wait for one move, check
//! it, compute the reply. Every state is a [`Phase`] variant carrying the
//! turn number and exactly the moves that state needs.
//!
//! ```text
//! Init -> Send -> AwaitRecv -> Validate -> Compute -> Send -> ... -> Done
//!          ^          |
//!          +-- lost --+
//! ```

use nim_core::{
    decode_move, encode_move, validate_move, EncodeError, FirstRowStrategy, GameState, Move,
    MoveStrategy, OpeningState, ProtocolViolation, Winner, MAX_ROWS,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::tracer::{TraceAction, Tracer};
use crate::transport::{Transport, TransportError};

/// How long to wait for the peer and how often to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait window for each receive
    pub receive_timeout: Duration,
    /// Consecutive lost turns tolerated before the game is abandoned.
    /// `None` keeps resending forever.
    pub max_lost_turns: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(1),
            max_lost_turns: None,
        }
    }
}

impl RetryPolicy {
    /// Whether `lost` consecutive lost turns exceed the budget
    pub fn gives_up_after(&self, lost: u32) -> bool {
        matches!(self.max_lost_turns, Some(max) if lost > max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopOptions {
    pub retry: RetryPolicy,
    /// Payload of the opening message
    pub opening: OpeningState,
    /// Treat a move that fails validation as lost instead of adopting it
    pub strict_validation: bool,
}

/// How a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Finished(Winner),
    /// The peer stopped answering and the retry budget ran out
    Abandoned { turn: u32, lost_turns: u32 },
}

impl GameOutcome {
    pub fn winner(&self) -> Option<Winner> {
        match self {
            GameOutcome::Finished(winner) => Some(*winner),
            GameOutcome::Abandoned { .. } => None,
        }
    }
}

/// State of the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    /// About to transmit `outgoing`
    Send { turn: u32, outgoing: Move, lost: u32 },
    /// `last_sent` is out, waiting for the reply
    AwaitRecv { turn: u32, last_sent: Move, lost: u32 },
    /// Reply arrived and must be checked against `last_sent`
    Validate {
        turn: u32,
        last_sent: Move,
        incoming: Move,
        lost: u32,
    },
    /// Reply accepted; adopt its board and pick our move
    Compute {
        turn: u32,
        last_sent: Move,
        incoming: Move,
        lost: u32,
    },
    Done(GameOutcome),
}

impl Phase {
    /// Turn number, counted in moves this client has generated
    pub fn turn(&self) -> Option<u32> {
        match self {
            Phase::Init | Phase::Done(_) => None,
            Phase::Send { turn, .. }
            | Phase::AwaitRecv { turn, .. }
            | Phase::Validate { turn, .. }
            | Phase::Compute { turn, .. } => Some(*turn),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Phase::Done(_))
    }
}

/// Counters collected while playing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    pub datagrams_sent: u32,
    pub send_errors: u32,
    pub moves_received: u32,
    pub timeouts: u32,
    pub decode_errors: u32,
    pub receive_errors: u32,
    /// Received moves thrown away (strict validation, missing or
    /// unaddressable board)
    pub discarded_moves: u32,
    pub violations: Vec<ProtocolViolation>,
}

/// Result of a complete game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReport {
    pub outcome: GameOutcome,
    pub turns: u32,
    /// Last board this client sent or adopted
    pub final_state: GameState,
    pub stats: GameStats,
}

#[derive(Debug, Error)]
pub enum GameLoopError {
    #[error("Cannot encode outgoing move: {0}")]
    Encode(#[from] EncodeError),
}

/// Drives one game against one peer
pub struct GameLoop<T: Transport, S: MoveStrategy = FirstRowStrategy> {
    transport: T,
    tracer: Arc<dyn Tracer>,
    strategy: S,
    seed: i8,
    options: LoopOptions,
    board: GameState,
    stats: GameStats,
}

impl<T: Transport> GameLoop<T, FirstRowStrategy> {
    pub fn new(transport: T, tracer: Arc<dyn Tracer>, seed: i8, options: LoopOptions) -> Self {
        Self::with_strategy(transport, tracer, seed, options, FirstRowStrategy)
    }
}

impl<T: Transport, S: MoveStrategy> GameLoop<T, S> {
    pub fn with_strategy(
        transport: T,
        tracer: Arc<dyn Tracer>,
        seed: i8,
        options: LoopOptions,
        strategy: S,
    ) -> Self {
        Self {
            transport,
            tracer,
            strategy,
            seed,
            options,
            board: GameState::empty(),
            stats: GameStats::default(),
        }
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    /// Last board sent or adopted
    pub fn board(&self) -> &GameState {
        &self.board
    }

    /// Play until the game is decided or abandoned
    pub async fn run(mut self) -> Result<GameReport, GameLoopError> {
        let mut phase = Phase::Init;
        let mut turns = 0;

        let outcome = loop {
            phase = self.step(phase).await?;
            if let Some(turn) = phase.turn() {
                turns = turn;
            }
            if let Phase::Done(outcome) = phase {
                break outcome;
            }
        };

        match outcome {
            GameOutcome::Finished(winner) => {
                info!(%winner, turns, "Game complete");
                self.record(TraceAction::GameComplete { winner }).await;
            }
            GameOutcome::Abandoned { turn, lost_turns } => {
                warn!(turn, lost_turns, "Game abandoned, peer stopped answering");
            }
        }

        Ok(GameReport {
            outcome,
            turns,
            final_state: self.board,
            stats: self.stats,
        })
    }

    /// Advance the state machine by one transition
    pub async fn step(&mut self, phase: Phase) -> Result<Phase, GameLoopError> {
        let next = match phase {
            Phase::Init => {
                self.record(TraceAction::GameStart { seed: self.seed }).await;
                let outgoing = Move::opening(self.seed, self.options.opening);
                info!(seed = self.seed, opening = ?self.options.opening, "Starting game");
                Phase::Send {
                    turn: 0,
                    outgoing,
                    lost: 0,
                }
            }

            Phase::Send {
                turn,
                outgoing,
                lost,
            } => {
                // Checked before sending; the exhausted board still goes out once
                let exhausted = outgoing.game_state.is_exhausted();
                let payload = encode_move(&outgoing)?;
                self.transmit(&payload).await;
                self.record(TraceAction::ClientMove(outgoing.clone())).await;
                self.board = outgoing.game_state.clone();

                if exhausted {
                    info!(turn, "Board exhausted on our turn, peer wins");
                    Phase::Done(GameOutcome::Finished(Winner::Server))
                } else {
                    Phase::AwaitRecv {
                        turn,
                        last_sent: outgoing,
                        lost,
                    }
                }
            }

            Phase::AwaitRecv {
                turn,
                last_sent,
                lost,
            } => match self.receive().await {
                Some(incoming) => {
                    self.record(TraceAction::ServerMoveReceive(incoming.clone()))
                        .await;
                    Phase::Validate {
                        turn,
                        last_sent,
                        incoming,
                        lost,
                    }
                }
                None => self.lost_turn(turn, last_sent, lost),
            },

            Phase::Validate {
                turn,
                last_sent,
                incoming,
                lost,
            } => {
                if incoming.is_sentinel() {
                    debug!(turn, "Peer opening message, nothing to validate");
                    Phase::Compute {
                        turn,
                        last_sent,
                        incoming,
                        lost,
                    }
                } else {
                    match validate_move(&last_sent.game_state, &incoming) {
                        Ok(()) => Phase::Compute {
                            turn,
                            last_sent,
                            incoming,
                            lost,
                        },
                        Err(violation) => {
                            warn!(turn, %violation, "Peer move failed validation");
                            self.stats.violations.push(violation);
                            if self.options.strict_validation {
                                self.stats.discarded_moves += 1;
                                self.lost_turn(turn, last_sent, lost)
                            } else {
                                Phase::Compute {
                                    turn,
                                    last_sent,
                                    incoming,
                                    lost,
                                }
                            }
                        }
                    }
                }
            }

            Phase::Compute {
                turn,
                last_sent,
                incoming,
                lost,
            } => {
                if incoming.game_state.is_empty() {
                    warn!(turn, "Peer sent no board, ignoring");
                    self.stats.discarded_moves += 1;
                    return Ok(self.lost_turn(turn, last_sent, lost));
                }
                if !incoming.game_state.is_addressable() {
                    warn!(
                        turn,
                        rows = incoming.game_state.len(),
                        max = MAX_ROWS,
                        "Peer board has more rows than a move can address, ignoring"
                    );
                    self.stats.discarded_moves += 1;
                    return Ok(self.lost_turn(turn, last_sent, lost));
                }

                self.board = incoming.game_state;
                match self.strategy.next_move(&self.board) {
                    None => {
                        info!(turn, "Peer emptied the board, we win");
                        Phase::Done(GameOutcome::Finished(Winner::Client))
                    }
                    Some(outgoing) => {
                        debug!(
                            turn = turn + 1,
                            row = outgoing.move_row,
                            state = %outgoing.game_state,
                            "Computed move"
                        );
                        Phase::Send {
                            turn: turn + 1,
                            outgoing,
                            lost: 0,
                        }
                    }
                }
            }

            Phase::Done(outcome) => Phase::Done(outcome),
        };

        Ok(next)
    }

    /// Nothing usable arrived: resend the same move, or give up
    fn lost_turn(&mut self, turn: u32, last_sent: Move, lost: u32) -> Phase {
        let lost = lost + 1;
        if self.options.retry.gives_up_after(lost) {
            return Phase::Done(GameOutcome::Abandoned {
                turn,
                lost_turns: lost,
            });
        }

        debug!(turn, lost, "Resending last move");
        Phase::Send {
            turn,
            outgoing: last_sent,
            lost,
        }
    }

    async fn transmit(&mut self, payload: &[u8]) {
        match self.transport.send(payload).await {
            Ok(()) => self.stats.datagrams_sent += 1,
            Err(e) => {
                // Same as a dropped datagram: the receive will time out
                warn!("Failed to send move: {}", e);
                self.stats.send_errors += 1;
            }
        }
    }

    async fn receive(&mut self) -> Option<Move> {
        let timeout = self.options.retry.receive_timeout;
        match self.transport.receive(timeout).await {
            Ok(payload) => match decode_move(&payload) {
                Ok(mv) => {
                    self.stats.moves_received += 1;
                    Some(mv)
                }
                Err(e) => {
                    warn!(bytes = payload.len(), "Discarding undecodable datagram: {}", e);
                    self.stats.decode_errors += 1;
                    None
                }
            },
            Err(TransportError::Timeout(waited)) => {
                debug!(?waited, "No reply from peer");
                self.stats.timeouts += 1;
                None
            }
            Err(e) => {
                warn!("Receive failed: {}", e);
                self.stats.receive_errors += 1;
                None
            }
        }
    }

    async fn record(&self, action: TraceAction) {
        if let Err(e) = self.tracer.record(&action).await {
            warn!("Failed to record trace event: {}", e);
        }
    }
}
