//! Error kinds.
//!
//! One `thiserror` enum per spec.md §7 kind, mirrored onto wire
//! `error { reason }` payloads by [`GameError::reason`].

use thiserror::Error;

/// Errors returned across the simulation's internal API boundaries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    /// Unknown match/player/spectator.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is already in the thing they're trying to join.
    #[error("already joined")]
    AlreadyJoined,

    /// A capacity limit was hit (`match_full`, `spectators_full`).
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// The target is in a terminal state (`match_finished`, `not_in_queue`).
    #[error("invalid state: {0}")]
    State(String),

    /// A precondition for the action was not met (`on_cooldown`,
    /// `insufficient_resource`, `out_of_range`).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Malformed caller input (JSON/schema violation).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller should retry (`operation_pending`, `temporarily_unavailable`).
    #[error("transient: {0}")]
    Transient(String),

    /// An invariant was violated after recovery was attempted; terminal
    /// for the enclosing match.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl GameError {
    /// The `reason` string sent to clients for this error, per spec.md §6.
    pub fn reason(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "not_found",
            GameError::AlreadyJoined => "already_joined",
            GameError::Capacity(msg) if msg.contains("spectator") => "spectators_full",
            GameError::Capacity(_) => "game_full",
            GameError::State(msg) if msg.contains("queue") => "not_in_queue",
            GameError::State(_) => "match_finished",
            GameError::Precondition(msg) if msg.contains("cooldown") => "on_cooldown",
            GameError::Precondition(msg) if msg.contains("range") => "out_of_range",
            GameError::Precondition(_) => "insufficient_resource",
            GameError::InvalidInput(_) => "invalid_input",
            GameError::Transient(msg) if msg.contains("pending") => "operation_pending",
            GameError::Transient(_) => "temporarily_unavailable",
            GameError::Fatal(_) => "match_errored",
        }
    }
}

/// Result alias used throughout the crate's synchronous APIs.
pub type GameResult<T> = Result<T, GameError>;
