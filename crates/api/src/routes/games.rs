use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::ApiRole;
use crate::services::{
    create_tournament, get_status, handle_mention, register, run_scheduler_tick, submit_move,
    CreateTournamentParams, GameStatus, MoveParams, RegisterParams, TickReport,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/register", post(register_player))
        .route("/play", post(play))
        .route("/mention", post(mention))
        .route("/{id}/status", get(status))
}

/// A manual tick may legitimately outlast the request timeout.
pub fn process_router() -> Router<AppState> {
    Router::new().route("/process", post(process))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub minutes_to_start: i64,
    pub max_rounds: i32,
    pub sponsor_id: i64,
    pub round_length_minutes: i32,
    pub winner_reward: i64,
    pub deposit_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    pub message: String,
    pub game_id: i64,
}

async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tournament = create_tournament(
        &state,
        CreateTournamentParams {
            minutes_to_start: req.minutes_to_start,
            max_rounds: req.max_rounds,
            sponsor_id: req.sponsor_id,
            round_length_minutes: req.round_length_minutes,
            winner_reward: req.winner_reward,
            deposit_id: req.deposit_id,
        },
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse {
            message: "Game created".to_string(),
            game_id: tournament.id,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub fid: i64,
    pub game_id: i64,
    #[serde(default)]
    pub force: bool,
}

async fn register_player(
    State(state): State<AppState>,
    Extension(role): Extension<ApiRole>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.force && role != ApiRole::Admin {
        return Err(AppError::Unauthorized(
            "Forced registration requires the admin key".to_string(),
        ));
    }

    register(
        &state,
        RegisterParams {
            tournament_id: req.game_id,
            user_id: req.fid,
            force: req.force,
        },
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registered for game".to_string(),
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub match_id: i64,
    pub fid: i64,
    #[serde(rename = "move")]
    pub value: i64,
}

async fn play(
    State(state): State<AppState>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    submit_move(
        &state,
        MoveParams {
            match_id: req.match_id,
            user_id: req.fid,
            value: req.value,
        },
        Utc::now(),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Move recorded".to_string(),
    }))
}

async fn process(State(state): State<AppState>) -> Json<TickReport> {
    Json(run_scheduler_tick(&state, Utc::now()).await)
}

#[derive(Deserialize)]
pub struct MentionAuthor {
    pub fid: i64,
}

#[derive(Deserialize)]
pub struct MentionPost {
    pub hash: String,
    pub author: MentionAuthor,
    pub text: String,
}

/// Webhook payload for a post mentioning the referee account.
#[derive(Deserialize)]
pub struct MentionRequest {
    pub data: MentionPost,
}

async fn mention(
    State(state): State<AppState>,
    Json(req): Json<MentionRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let post = req.data;
    let opened = handle_mention(&state, &post.hash, post.author.fid, &post.text).await?;

    let message = match opened {
        Some(tournament) => format!("Registration opened for tournament {}", tournament.id),
        None => "No matching tournament".to_string(),
    };
    Ok(Json(MessageResponse { message }))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub fid: i64,
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<GameStatus>, AppError> {
    Ok(Json(get_status(&state, id, query.fid).await?))
}
