/// Comment repository - comments joined with their author's display columns
use sqlx::{AnyConnection, AnyPool};

use crate::db::now;
use crate::models::Comment;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.user_id, c.parent_id, c.content, c.likes_count, c.status,
           c.is_edited, c.created_at, c.updated_at,
           u.username AS author_username, u.avatar_url AS author_avatar
    FROM comments c
    LEFT JOIN users u ON u.id = c.user_id
"#;

/// Insert a comment inside a transaction and return its id
pub async fn create_comment(
    conn: &mut AnyConnection,
    post_id: i64,
    user_id: i64,
    parent_id: Option<i64>,
    content: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (post_id, user_id, parent_id, content, created_at, updated_at)
        VALUES ($1, $2, CAST($3 AS BIGINT), $4, $5, $5)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(parent_id)
    .bind(content)
    .bind(now())
    .fetch_one(&mut *conn)
    .await
}

/// Find a comment by id regardless of status
pub async fn find_comment_by_id(pool: &AnyPool, id: i64) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Published top-level comments of a post, oldest first
pub async fn list_top_level(
    pool: &AnyPool,
    post_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Comment>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id IS NULL AND status = 'published'",
    )
    .bind(post_id)
    .fetch_one(pool)
    .await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        r#"
        {COMMENT_SELECT}
        WHERE c.post_id = $1 AND c.parent_id IS NULL AND c.status = 'published'
        ORDER BY c.created_at ASC, c.id ASC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((comments, total))
}

/// Every published reply on a post, oldest first
pub async fn list_replies(pool: &AnyPool, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        {COMMENT_SELECT}
        WHERE c.post_id = $1 AND c.parent_id IS NOT NULL AND c.status = 'published'
        ORDER BY c.created_at ASC, c.id ASC
        "#
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Replace the content and mark the comment edited
pub async fn update_content(
    pool: &AnyPool,
    id: i64,
    content: &str,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query("UPDATE comments SET content = $1, is_edited = 1, updated_at = $2 WHERE id = $3")
        .bind(content)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;

    find_comment_by_id(pool, id).await
}

/// Mark a comment deleted. Returns whether a live comment was changed.
pub async fn soft_delete(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE comments SET status = 'deleted', updated_at = $1 WHERE id = $2 AND status <> 'deleted'",
    )
    .bind(now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn increment_likes(conn: &mut AnyConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE comments SET likes_count = likes_count + 1 WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Decrement the like counter, never below zero
pub async fn decrement_likes(conn: &mut AnyConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE comments SET likes_count = CASE WHEN likes_count > 0 THEN likes_count - 1 ELSE 0 END WHERE id = $1",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sqlite_db;
    use crate::db::user_repo::{self, NewUser};

    async fn seed(pool: &AnyPool) -> (i64, i64) {
        let user = user_repo::create_user(
            pool,
            &NewUser {
                username: "commenter",
                email: "commenter@example.com",
                password_hash: "hash",
                phone: None,
                gender: "unknown",
                age: None,
                city: None,
            },
        )
        .await
        .unwrap();
        let post_id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (user_id, content, created_at, updated_at) VALUES ($1, 'a post body', $2, $2) RETURNING id",
        )
        .bind(user.id)
        .bind(now())
        .fetch_one(pool)
        .await
        .unwrap();
        (user.id, post_id)
    }

    #[tokio::test]
    async fn test_threads_split_top_level_and_replies() {
        let (db, _dir) = sqlite_db().await;
        let (uid, pid) = seed(&db.pool).await;
        let mut conn = db.pool.acquire().await.unwrap();

        let root = create_comment(&mut conn, pid, uid, None, "first!").await.unwrap();
        create_comment(&mut conn, pid, uid, Some(root), "reply one").await.unwrap();
        let hidden = create_comment(&mut conn, pid, uid, Some(root), "reply two").await.unwrap();
        assert!(soft_delete(&mut conn, hidden).await.unwrap());
        drop(conn);

        let (top, total) = list_top_level(&db.pool, pid, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(top[0].id, root);
        assert_eq!(top[0].author_username.as_deref(), Some("commenter"));

        let replies = list_replies(&db.pool, pid).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].parent_id, Some(root));
    }

    #[tokio::test]
    async fn test_update_marks_edited() {
        let (db, _dir) = sqlite_db().await;
        let (uid, pid) = seed(&db.pool).await;
        let mut conn = db.pool.acquire().await.unwrap();
        let id = create_comment(&mut conn, pid, uid, None, "original").await.unwrap();
        drop(conn);

        let updated = update_content(&db.pool, id, "changed").await.unwrap().unwrap();
        assert_eq!(updated.content, "changed");
        assert!(updated.is_edited);
    }

    #[tokio::test]
    async fn test_like_counter_floor() {
        let (db, _dir) = sqlite_db().await;
        let (uid, pid) = seed(&db.pool).await;
        let mut conn = db.pool.acquire().await.unwrap();
        let id = create_comment(&mut conn, pid, uid, None, "count me").await.unwrap();
        increment_likes(&mut conn, id).await.unwrap();
        decrement_likes(&mut conn, id).await.unwrap();
        decrement_likes(&mut conn, id).await.unwrap();
        drop(conn);

        let comment = find_comment_by_id(&db.pool, id).await.unwrap().unwrap();
        assert_eq!(comment.likes_count, 0);
    }
}
