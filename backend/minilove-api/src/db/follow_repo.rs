use sqlx::AnyPool;

use crate::db::now;
use crate::models::{Follow, User};

/// Create a follow edge. Returns `None` if the edge already exists.
pub async fn create_follow(
    pool: &AnyPool,
    follower_id: i64,
    following_id: i64,
) -> Result<Option<Follow>, sqlx::Error> {
    sqlx::query_as::<_, Follow>(
        r#"
        INSERT INTO follows (follower_id, following_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        RETURNING id, follower_id, following_id, created_at
        "#,
    )
    .bind(follower_id)
    .bind(following_id)
    .bind(now())
    .fetch_optional(pool)
    .await
}

/// Remove a follow edge. Returns whether an edge was removed.
pub async fn delete_follow(
    pool: &AnyPool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Check if `follower_id` follows `following_id`
pub async fn is_following(
    pool: &AnyPool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM follows WHERE follower_id = $1 AND following_id = $2 LIMIT 1",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

const EDGE_USER_COLUMNS: &str = r#"
    u.id, u.username, u.email, u.phone, u.password_hash, u.avatar_url, u.bio, u.gender, u.age,
    u.city, u.membership_level, u.membership_expires_at, u.role, u.posts_count, u.comments_count,
    u.likes_given_count, u.likes_received_count, u.is_active, u.is_verified, u.created_at,
    u.updated_at
"#;

/// Users that `user_id` follows, most recent first
pub async fn list_following(
    pool: &AnyPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {EDGE_USER_COLUMNS}
        FROM follows f
        JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC, f.id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

/// Users following `user_id`, most recent first
pub async fn list_followers(
    pool: &AnyPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {EDGE_USER_COLUMNS}
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC, f.id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}
