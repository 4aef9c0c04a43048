use sqlx::{PgExecutor, Result};

use crate::models::{NewRegistration, ParticipantRow, RegistrationRow};

/// Insert a registration unless the tournament already holds `capacity` registrations.
/// Returns `None` when the capacity guard rejected the insert.
pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    data: NewRegistration,
    capacity: Option<i64>,
) -> Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(
        r#"
        INSERT INTO registrations (tournament_id, user_id, registered_at, token_balance, forced)
        SELECT $1, $2, $3, $4, $5
        WHERE $6::bigint IS NULL
           OR (SELECT COUNT(*) FROM registrations WHERE tournament_id = $1) < $6
        RETURNING id, tournament_id, user_id, registered_at, token_balance, forced
        "#,
    )
    .bind(data.tournament_id)
    .bind(data.user_id)
    .bind(data.registered_at)
    .bind(data.token_balance)
    .bind(data.forced)
    .bind(capacity)
    .fetch_optional(executor)
    .await
}

pub async fn get_by_tournament_and_user<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: i64,
    user_id: i64,
) -> Result<Option<RegistrationRow>> {
    sqlx::query_as::<_, RegistrationRow>(
        r#"
        SELECT id, tournament_id, user_id, registered_at, token_balance, forced
        FROM registrations
        WHERE tournament_id = $1 AND user_id = $2
        "#,
    )
    .bind(tournament_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn count_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: i64,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations WHERE tournament_id = $1")
        .bind(tournament_id)
        .fetch_one(executor)
        .await
}

/// Registrants in registration order, with their last activity for seeding.
pub async fn list_participants<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: i64,
) -> Result<Vec<ParticipantRow>> {
    sqlx::query_as::<_, ParticipantRow>(
        r#"
        SELECT r.id AS registration_id, r.user_id, r.registered_at, r.token_balance, u.last_played
        FROM registrations r
        JOIN users u ON u.id = r.user_id
        WHERE r.tournament_id = $1
        ORDER BY r.registered_at ASC, r.id ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}
