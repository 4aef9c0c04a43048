use infra::StoreError;
use thiserror::Error;

use super::UserId;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid input: {0}")]
    BadInput(String),

    #[error("tournament {0} has already started")]
    AlreadyStarted(i64),

    #[error("user {user_id} is already registered for tournament {tournament_id}")]
    DuplicateRegistration { tournament_id: i64, user_id: UserId },

    #[error("deposit {0} has already been used for another tournament")]
    DuplicateDeposit(String),

    #[error("tournament {tournament_id} is full ({capacity} players)")]
    Full { tournament_id: i64, capacity: i64 },

    #[error("invalid move {0}, expected 0 (rock), 1 (paper) or 2 (scissors)")]
    InvalidMove(i64),

    #[error("move already made in match {0}")]
    MoveAlreadyMade(i64),

    #[error("match {0} is not in the current round")]
    NotCurrentRound(i64),

    #[error("user {user_id} does not play in match {match_id}")]
    NotAParticipant { match_id: i64, user_id: UserId },

    #[error("round {0} has already been processed")]
    AlreadyProcessed(i64),

    #[error("invalid match: no participants")]
    InvalidMatch,

    #[error("no participants registered")]
    EmptyField,

    #[error("winner {0} has no opponent for the next round")]
    UnpairedWinner(UserId),

    #[error("round {0} produced no winner")]
    NoWinner(i64),

    #[error("upstream failure: {0}")]
    Store(#[from] StoreError),

    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl GameError {
    /// Bracket-integrity violations point at a bug or corrupted data and need manual attention.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            GameError::InvalidMatch
                | GameError::EmptyField
                | GameError::UnpairedWinner(_)
                | GameError::NoWinner(_)
        )
    }
}
