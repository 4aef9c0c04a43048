use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::game::{GameError, UserId};
use crate::AppState;
use infra::models::MatchRow;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: i64,
    pub opponent_id: Option<UserId>,
    pub opponent_name: Option<String>,
    pub opponent_display_name: Option<String>,
    pub opponent_image: Option<String>,
    /// Hidden until the match has a winner.
    pub opponent_move: Option<i16>,
    pub player_move: Option<i16>,
    pub player_won: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub id: i64,
    pub round_number: i32,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "match")]
    pub viewer_match: Option<MatchView>,
}

/// Everything a frame needs to render a tournament for one viewer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub game_id: i64,
    pub user_name: String,
    pub user_display_name: String,
    pub user_image: Option<String>,
    pub current_round_id: Option<i64>,
    pub current_round_number: Option<i32>,
    pub game_state: u8,
    pub registration_start: DateTime<Utc>,
    pub game_start: DateTime<Utc>,
    pub current_registrations: i64,
    pub user_registered: bool,
    pub rounds: Vec<RoundView>,
    pub winner_id: Option<UserId>,
    pub cast_hash: Option<String>,
}

pub async fn get_status(
    state: &AppState,
    tournament_id: i64,
    viewer: UserId,
) -> Result<GameStatus, GameError> {
    let tournament = state
        .store
        .get_tournament(tournament_id)
        .await?
        .ok_or_else(|| GameError::NotFound(format!("tournament {}", tournament_id)))?;

    let profile = state.profiles.display(viewer).await?;
    let current_registrations = state.store.count_registrations(tournament_id).await?;
    let user_registered = state
        .store
        .get_registration(tournament_id, viewer)
        .await?
        .is_some();

    let rounds = state.store.list_rounds(tournament_id).await?;
    let current_round_number = rounds
        .iter()
        .find(|r| Some(r.id) == tournament.current_round_id)
        .map(|r| r.round_number);

    let mut round_views = Vec::with_capacity(rounds.len());
    for round in rounds {
        let matches = state.store.list_matches(round.id).await?;
        let viewer_match = match matches.iter().find(|m| m.slot_of(viewer).is_some()) {
            Some(m) => Some(match_view(state, m, viewer).await?),
            None => None,
        };
        round_views.push(RoundView {
            id: round.id,
            round_number: round.round_number,
            end_time: round.deadline,
            viewer_match,
        });
    }

    Ok(GameStatus {
        game_id: tournament.id,
        user_name: profile.name,
        user_display_name: profile.display_name,
        user_image: profile.image,
        current_round_id: tournament.current_round_id,
        current_round_number,
        game_state: tournament.state.code(),
        registration_start: tournament.registration_start,
        game_start: tournament.scheduled_start,
        current_registrations,
        user_registered,
        rounds: round_views,
        winner_id: tournament.winner_id,
        cast_hash: tournament.announcement_ref,
    })
}

async fn match_view(state: &AppState, m: &MatchRow, viewer: UserId) -> Result<MatchView, GameError> {
    let resolved = m.winner_id.is_some();
    let slot = m.slot_of(viewer);
    let opponent_id = m.opponent_of(viewer);

    let opponent = match opponent_id {
        Some(id) => Some(state.profiles.display(id).await?),
        None => None,
    };
    let opponent_move = match (resolved, opponent_id) {
        (true, Some(id)) => m.slot_of(id).and_then(|s| m.move_in(s)),
        _ => None,
    };

    Ok(MatchView {
        id: m.id,
        opponent_id,
        opponent_name: opponent.as_ref().map(|p| p.name.clone()),
        opponent_display_name: opponent.as_ref().map(|p| p.display_name.clone()),
        opponent_image: opponent.and_then(|p| p.image),
        opponent_move,
        player_move: slot.and_then(|s| m.move_in(s)),
        player_won: m.winner_id == Some(viewer),
    })
}
