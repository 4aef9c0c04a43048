use sqlx::{PgExecutor, Result};

use crate::models::{NewRound, RoundRow};

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: i64,
    round: &NewRound,
) -> Result<RoundRow> {
    sqlx::query_as::<_, RoundRow>(
        r#"
        INSERT INTO rounds (tournament_id, round_number, deadline)
        VALUES ($1, $2, $3)
        RETURNING id, tournament_id, round_number, deadline
        "#,
    )
    .bind(tournament_id)
    .bind(round.round_number)
    .bind(round.deadline)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<RoundRow>> {
    sqlx::query_as::<_, RoundRow>(
        "SELECT id, tournament_id, round_number, deadline FROM rounds WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn list_by_tournament<'e>(
    executor: impl PgExecutor<'e>,
    tournament_id: i64,
) -> Result<Vec<RoundRow>> {
    sqlx::query_as::<_, RoundRow>(
        r#"
        SELECT id, tournament_id, round_number, deadline
        FROM rounds
        WHERE tournament_id = $1
        ORDER BY round_number ASC
        "#,
    )
    .bind(tournament_id)
    .fetch_all(executor)
    .await
}

/// Row lock used to serialize match creation for a round.
pub async fn lock<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM rounds WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}
