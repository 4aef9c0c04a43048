use sqlx::{PgExecutor, Result};

use crate::models::{MatchRow, MatchSlot, NewMatch};

pub async fn create<'e>(
    executor: impl PgExecutor<'e>,
    round_id: i64,
    seed: &NewMatch,
) -> Result<MatchRow> {
    sqlx::query_as::<_, MatchRow>(
        r#"
        INSERT INTO matches (round_id, player_a, player_b)
        VALUES ($1, $2, $3)
        RETURNING id, round_id, player_a, player_b, move_a, move_b, winner_id
        "#,
    )
    .bind(round_id)
    .bind(seed.player_a)
    .bind(seed.player_b)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<MatchRow>> {
    sqlx::query_as::<_, MatchRow>(
        r#"
        SELECT id, round_id, player_a, player_b, move_a, move_b, winner_id
        FROM matches
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Matches of a round in creation order, which is also bracket order.
pub async fn list_by_round<'e>(
    executor: impl PgExecutor<'e>,
    round_id: i64,
) -> Result<Vec<MatchRow>> {
    sqlx::query_as::<_, MatchRow>(
        r#"
        SELECT id, round_id, player_a, player_b, move_a, move_b, winner_id
        FROM matches
        WHERE round_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(round_id)
    .fetch_all(executor)
    .await
}

pub async fn count_by_round<'e>(executor: impl PgExecutor<'e>, round_id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM matches WHERE round_id = $1")
        .bind(round_id)
        .fetch_one(executor)
        .await
}

/// Fill a move slot that is still empty.
pub async fn record_move<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    slot: MatchSlot,
    value: i16,
) -> Result<bool> {
    let column = slot.move_column();
    let result = sqlx::query(&format!(
        "UPDATE matches SET {column} = $2 WHERE id = $1 AND {column} IS NULL AND winner_id IS NULL"
    ))
    .bind(id)
    .bind(value)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn record_winner<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    winner_id: i64,
) -> Result<bool> {
    let result =
        sqlx::query("UPDATE matches SET winner_id = $2 WHERE id = $1 AND winner_id IS NULL")
            .bind(id)
            .bind(winner_id)
            .execute(executor)
            .await?;

    Ok(result.rows_affected() == 1)
}
