use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, Result};

use crate::models::{NewUser, UserRow};

pub async fn get_by_id<'e>(executor: impl PgExecutor<'e>, id: i64) -> Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, name, display_name, image, last_played, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Insert the user if unknown; an existing row is returned untouched.
pub async fn insert_if_missing<'e>(executor: impl PgExecutor<'e>, data: NewUser) -> Result<UserRow> {
    sqlx::query_as::<_, UserRow>(
        r#"
        WITH inserted AS (
            INSERT INTO users (id, name, display_name, image)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, name, display_name, image, last_played, created_at
        )
        SELECT id, name, display_name, image, last_played, created_at FROM inserted
        UNION ALL
        SELECT id, name, display_name, image, last_played, created_at FROM users WHERE id = $1
        LIMIT 1
        "#,
    )
    .bind(data.id)
    .bind(data.name)
    .bind(data.display_name)
    .bind(data.image)
    .fetch_one(executor)
    .await
}

pub async fn touch_last_played<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET last_played = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn list_ids<'e>(executor: impl PgExecutor<'e>) -> Result<Vec<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users ORDER BY id ASC")
        .fetch_all(executor)
        .await
}
