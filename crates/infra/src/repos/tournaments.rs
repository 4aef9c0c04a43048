use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Result};

use crate::models::{NewTournament, TournamentRow, TournamentState};

const TOURNAMENT_COLUMNS: &str = "id, registration_start, scheduled_start, round_length_minutes, \
     max_rounds, state, current_round_id, completed, winner_id, sponsor_id, winner_reward, \
     deposit_id, announcement_ref, created_at";

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    data: NewTournament,
) -> Result<TournamentRow> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        r#"
        INSERT INTO tournaments (
            registration_start, scheduled_start, round_length_minutes, max_rounds,
            sponsor_id, winner_reward, deposit_id, state
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'created')
        RETURNING {TOURNAMENT_COLUMNS}
        "#
    ))
    .bind(data.registration_start)
    .bind(data.scheduled_start)
    .bind(data.round_length_minutes)
    .bind(data.max_rounds)
    .bind(data.sponsor_id)
    .bind(data.winner_reward)
    .bind(data.deposit_id)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> Result<Option<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn get_by_deposit_id<'e>(
    executor: impl PgExecutor<'e>,
    deposit_id: &str,
) -> Result<Option<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE deposit_id = $1"
    ))
    .bind(deposit_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_by_state<'e>(
    executor: impl PgExecutor<'e>,
    state: TournamentState,
) -> Result<Vec<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        r#"
        SELECT {TOURNAMENT_COLUMNS}
        FROM tournaments
        WHERE state = $1
        ORDER BY scheduled_start ASC, id ASC
        "#
    ))
    .bind(state)
    .fetch_all(executor)
    .await
}

/// Registering tournaments whose scheduled start has passed and that have no round yet.
pub async fn list_ready_to_start<'e>(
    executor: impl PgExecutor<'e>,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        r#"
        SELECT {TOURNAMENT_COLUMNS}
        FROM tournaments
        WHERE state = 'registering'
          AND current_round_id IS NULL
          AND scheduled_start <= $1
        ORDER BY scheduled_start ASC, id ASC
        "#
    ))
    .bind(now)
    .fetch_all(executor)
    .await
}

/// Active tournaments whose current round deadline has passed.
pub async fn list_due_for_processing<'e>(
    executor: impl PgExecutor<'e>,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(
        r#"
        SELECT t.id, t.registration_start, t.scheduled_start, t.round_length_minutes,
               t.max_rounds, t.state, t.current_round_id, t.completed, t.winner_id,
               t.sponsor_id, t.winner_reward, t.deposit_id, t.announcement_ref, t.created_at
        FROM tournaments t
        JOIN rounds r ON r.id = t.current_round_id
        WHERE t.state = 'active'
          AND t.completed = FALSE
          AND r.deadline <= $1
        ORDER BY r.deadline ASC, t.id ASC
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await
}

/// created -> registering, only for the sponsoring user.
pub async fn open_registration<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    sponsor_id: i64,
    announcement_ref: &str,
) -> Result<Option<TournamentRow>> {
    sqlx::query_as::<_, TournamentRow>(&format!(
        r#"
        UPDATE tournaments
        SET state = 'registering',
            announcement_ref = $3
        WHERE id = $1
          AND sponsor_id = $2
          AND state = 'created'
        RETURNING {TOURNAMENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(sponsor_id)
    .bind(announcement_ref)
    .fetch_optional(executor)
    .await
}

/// registering -> active. Returns false when another caller already started it.
pub async fn activate<'e>(executor: impl PgExecutor<'e>, id: i64, round_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tournaments
        SET state = 'active',
            current_round_id = $2
        WHERE id = $1
          AND state = 'registering'
          AND current_round_id IS NULL
        "#,
    )
    .bind(id)
    .bind(round_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move the current-round pointer forward, guarded on the round being left.
pub async fn advance_round<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    from_round_id: i64,
    to_round_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tournaments
        SET current_round_id = $3
        WHERE id = $1
          AND state = 'active'
          AND current_round_id = $2
        "#,
    )
    .bind(id)
    .bind(from_round_id)
    .bind(to_round_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record the winner and clear the round pointer. `from_round_id` is `None` for walkovers
/// decided before any round exists.
pub async fn complete<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    from_round_id: Option<i64>,
    winner_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tournaments
        SET state = 'completed',
            completed = TRUE,
            winner_id = $3,
            current_round_id = NULL
        WHERE id = $1
          AND completed = FALSE
          AND state IN ('registering', 'active')
          AND current_round_id IS NOT DISTINCT FROM $2
        "#,
    )
    .bind(id)
    .bind(from_round_id)
    .bind(winner_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Row lock that serializes registrations of one tournament.
pub async fn lock<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM tournaments WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn set_announcement_ref<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    announcement_ref: &str,
) -> Result<()> {
    sqlx::query("UPDATE tournaments SET announcement_ref = $2 WHERE id = $1")
        .bind(id)
        .bind(announcement_ref)
        .execute(executor)
        .await?;
    Ok(())
}
