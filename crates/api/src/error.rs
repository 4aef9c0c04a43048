use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::game::GameError;
use infra::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn game_status(e: &GameError) -> StatusCode {
    match e {
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::BadInput(_) | GameError::InvalidMove(_) => StatusCode::BAD_REQUEST,
        GameError::InvalidState(_)
        | GameError::AlreadyStarted(_)
        | GameError::NotCurrentRound(_)
        | GameError::NotAParticipant { .. } => StatusCode::BAD_REQUEST,
        GameError::DuplicateRegistration { .. }
        | GameError::DuplicateDeposit(_)
        | GameError::Full { .. }
        | GameError::MoveAlreadyMade(_)
        | GameError::AlreadyProcessed(_) => StatusCode::CONFLICT,
        GameError::InvalidMatch
        | GameError::EmptyField
        | GameError::UnpairedWinner(_)
        | GameError::NoWinner(_)
        | GameError::Store(_)
        | GameError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Game(e) => game_status(e),
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
