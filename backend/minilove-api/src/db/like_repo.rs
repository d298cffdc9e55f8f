use sqlx::{AnyConnection, AnyPool};

use crate::db::now;
use crate::models::Like;

/// What a like points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Post(i64),
    Comment(i64),
}

impl LikeTarget {
    fn column(&self) -> &'static str {
        match self {
            LikeTarget::Post(_) => "post_id",
            LikeTarget::Comment(_) => "comment_id",
        }
    }

    fn id(&self) -> i64 {
        match self {
            LikeTarget::Post(id) | LikeTarget::Comment(id) => *id,
        }
    }
}

/// Record a like. Returns `None` when the user already liked the target.
pub async fn create_like(
    conn: &mut AnyConnection,
    user_id: i64,
    target: LikeTarget,
) -> Result<Option<Like>, sqlx::Error> {
    let column = target.column();

    sqlx::query_as::<_, Like>(&format!(
        r#"
        INSERT INTO likes (user_id, {column}, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, {column}) DO NOTHING
        RETURNING id, user_id, post_id, comment_id, created_at
        "#
    ))
    .bind(user_id)
    .bind(target.id())
    .bind(now())
    .fetch_optional(&mut *conn)
    .await
}

/// Remove a like. Returns whether a like existed.
pub async fn delete_like(
    conn: &mut AnyConnection,
    user_id: i64,
    target: LikeTarget,
) -> Result<bool, sqlx::Error> {
    let column = target.column();
    let result = sqlx::query(&format!("DELETE FROM likes WHERE user_id = $1 AND {column} = $2"))
        .bind(user_id)
        .bind(target.id())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn has_liked(pool: &AnyPool, user_id: i64, target: LikeTarget) -> Result<bool, sqlx::Error> {
    let column = target.column();
    let row: Option<(i64,)> = sqlx::query_as(&format!(
        "SELECT id FROM likes WHERE user_id = $1 AND {column} = $2 LIMIT 1"
    ))
    .bind(user_id)
    .bind(target.id())
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Number of like rows for a target
pub async fn count_likes(pool: &AnyPool, target: LikeTarget) -> Result<i64, sqlx::Error> {
    let column = target.column();
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM likes WHERE {column} = $1"))
        .bind(target.id())
        .fetch_one(pool)
        .await
}
