use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::game::{GameError, Move, UserId};
use crate::AppState;
use infra::models::MatchRow;

#[derive(Debug, Clone, Copy)]
pub struct MoveParams {
    pub match_id: i64,
    pub user_id: UserId,
    /// Raw move value as submitted: 0 rock, 1 paper, 2 scissors.
    pub value: i64,
}

/// Record a player's move in a match of the current round.
///
/// Moves are final: a slot that already holds a move is never overwritten.
pub async fn submit_move(
    state: &AppState,
    params: MoveParams,
    now: DateTime<Utc>,
) -> Result<MatchRow, GameError> {
    let mv = Move::try_from(params.value)?;

    let game_match = state
        .store
        .get_match(params.match_id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("match {}", params.match_id)))?;
    let round = state
        .store
        .get_round(game_match.round_id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("round {}", game_match.round_id)))?;
    let tournament = state
        .store
        .get_tournament(round.tournament_id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("tournament {}", round.tournament_id)))?;

    if tournament.current_round_id != Some(round.id) || now >= round.deadline {
        return Err(GameError::NotCurrentRound(game_match.id));
    }

    let slot = game_match
        .slot_of(params.user_id)
        .ok_or(GameError::NotAParticipant {
            match_id: game_match.id,
            user_id: params.user_id,
        })?;

    if game_match.move_in(slot).is_some()
        || !state
            .store
            .record_move(game_match.id, slot, mv.value())
            .await?
    {
        return Err(GameError::MoveAlreadyMade(game_match.id));
    }

    info!(
        "User {} played {} in match {}",
        params.user_id,
        mv.name(),
        game_match.id
    );

    if let Err(e) = state.store.touch_last_played(params.user_id, now).await {
        warn!("Could not update last_played for user {}: {}", params.user_id, e);
    }

    let updated = state
        .store
        .get_match(game_match.id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("match {}", game_match.id)))?;
    Ok(updated)
}
