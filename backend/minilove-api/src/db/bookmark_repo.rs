use sqlx::AnyPool;

use crate::db::now;
use crate::models::Bookmark;

/// Bookmark a post. Returns `None` if it is already bookmarked.
pub async fn create_bookmark(
    pool: &AnyPool,
    user_id: i64,
    post_id: i64,
) -> Result<Option<Bookmark>, sqlx::Error> {
    sqlx::query_as::<_, Bookmark>(
        r#"
        INSERT INTO bookmarks (user_id, post_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, post_id) DO NOTHING
        RETURNING id, user_id, post_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(post_id)
    .bind(now())
    .fetch_optional(pool)
    .await
}

/// Remove a bookmark. Returns whether one existed.
pub async fn delete_bookmark(pool: &AnyPool, user_id: i64, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND post_id = $2")
        .bind(user_id)
        .bind(post_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_bookmarked(pool: &AnyPool, user_id: i64, post_id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM bookmarks WHERE user_id = $1 AND post_id = $2 LIMIT 1")
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}
