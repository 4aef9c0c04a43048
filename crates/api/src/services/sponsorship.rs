use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::game::{GameError, UserId};
use crate::AppState;
use infra::models::{NewTournament, TournamentRow};
use infra::StoreError;

const MENTION_MARKER: &str = "Tournament #";

#[derive(Debug, Clone)]
pub struct CreateTournamentParams {
    pub minutes_to_start: i64,
    pub max_rounds: i32,
    pub sponsor_id: UserId,
    pub round_length_minutes: i32,
    pub winner_reward: i64,
    pub deposit_id: String,
}

/// Round up to the next quarter hour, dropping seconds.
pub fn round_up_to_quarter_hour(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = at.timestamp();
    let hour_start = secs - secs.rem_euclid(3600);
    let minute = secs.rem_euclid(3600) / 60;
    let rounded = (minute + 14) / 15 * 15;
    DateTime::from_timestamp(hour_start + rounded * 60, 0)
}

/// Create a sponsored tournament in the `created` state.
pub async fn create_tournament(
    state: &AppState,
    params: CreateTournamentParams,
    now: DateTime<Utc>,
) -> Result<TournamentRow, GameError> {
    if params.minutes_to_start < 0 {
        return Err(GameError::BadInput("minutesToStart must not be negative".into()));
    }
    if !(1..=30).contains(&params.max_rounds) {
        return Err(GameError::BadInput("maxRounds must be between 1 and 30".into()));
    }
    if params.round_length_minutes < 1 {
        return Err(GameError::BadInput("roundLengthMinutes must be at least 1".into()));
    }
    let deposit_id = params.deposit_id.trim().to_string();
    if deposit_id.is_empty() {
        return Err(GameError::BadInput("depositId is required".into()));
    }

    if state
        .store
        .get_tournament_by_deposit(&deposit_id)
        .await?
        .is_some()
    {
        return Err(GameError::DuplicateDeposit(deposit_id));
    }

    let scheduled_start = round_up_to_quarter_hour(now + Duration::minutes(params.minutes_to_start))
        .ok_or_else(|| GameError::BadInput("start time out of range".into()))?;

    let created = state
        .store
        .create_tournament(NewTournament {
            registration_start: now,
            scheduled_start,
            round_length_minutes: params.round_length_minutes,
            max_rounds: params.max_rounds,
            sponsor_id: Some(params.sponsor_id),
            winner_reward: Some(params.winner_reward),
            deposit_id: Some(deposit_id.clone()),
        })
        .await;

    match created {
        Ok(tournament) => {
            info!(
                "Tournament {} created by sponsor {}, starts at {}",
                tournament.id, params.sponsor_id, tournament.scheduled_start
            );
            Ok(tournament)
        }
        Err(StoreError::Conflict(_)) => Err(GameError::DuplicateDeposit(deposit_id)),
        Err(e) => Err(e.into()),
    }
}

/// Extract `<id>` from the first `Tournament #<id>!` in a post.
pub fn parse_tournament_mention(text: &str) -> Option<i64> {
    text.match_indices(MENTION_MARKER).find_map(|(idx, marker)| {
        let rest = &text[idx + marker.len()..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 || !rest[digits..].starts_with('!') {
            return None;
        }
        rest[..digits].parse().ok()
    })
}

/// A sponsor's post naming one of their `created` tournaments opens its registration.
///
/// Returns the opened tournament, or `None` when the post matches nothing.
pub async fn handle_mention(
    state: &AppState,
    post_ref: &str,
    author_id: UserId,
    text: &str,
) -> Result<Option<TournamentRow>, GameError> {
    let Some(tournament_id) = parse_tournament_mention(text) else {
        return Ok(None);
    };

    let Some(tournament) = state
        .store
        .open_registration(tournament_id, author_id, post_ref)
        .await?
    else {
        info!(
            "Mention of tournament {} by {} did not match a created tournament",
            tournament_id, author_id
        );
        return Ok(None);
    };

    info!("Registration opened for tournament {}", tournament.id);

    if let Err(e) = state.profiles.get_or_create_profile(author_id).await {
        warn!("Could not load sponsor {} profile: {}", author_id, e);
    }
    state
        .broadcaster
        .registration_opened(&tournament, author_id, post_ref)
        .await;

    Ok(Some(tournament))
}
