use sqlx::{AnyConnection, AnyPool};

use crate::db::now;
use crate::models::Topic;

const TOPIC_COLUMNS: &str = r#"
    id, name, description, cover_image, posts_count, participants_count, is_active,
    is_featured, created_at
"#;

/// Active topics, busiest first
pub async fn list_active(pool: &AnyPool) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE is_active = 1 ORDER BY posts_count DESC, id ASC"
    ))
    .fetch_all(pool)
    .await
}

/// Featured active topics ordered by participants
pub async fn list_featured(pool: &AnyPool, limit: i64) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        r#"
        SELECT {TOPIC_COLUMNS} FROM topics
        WHERE is_active = 1 AND is_featured = 1
        ORDER BY participants_count DESC, id ASC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Count a newly published post against the topic named `name`, if any
pub async fn bump_posts_count(conn: &mut AnyConnection, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE topics SET posts_count = posts_count + 1, updated_at = $1 WHERE name = $2")
        .bind(now())
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Undo `bump_posts_count` when a published post goes away, never below zero
pub async fn drop_posts_count(conn: &mut AnyConnection, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE topics
        SET posts_count = CASE WHEN posts_count > 0 THEN posts_count - 1 ELSE 0 END, updated_at = $1
        WHERE name = $2
        "#,
    )
    .bind(now())
    .bind(name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sqlite_db;

    #[tokio::test]
    async fn test_seeded_topics() {
        let (db, _dir) = sqlite_db().await;
        let topics = list_active(&db.pool).await.unwrap();
        assert_eq!(topics.len(), 5);

        let featured = list_featured(&db.pool, 10).await.unwrap();
        assert!(!featured.is_empty());
        assert!(featured
            .windows(2)
            .all(|w| w[0].participants_count >= w[1].participants_count));
    }

    #[tokio::test]
    async fn test_bump_posts_count() {
        let (db, _dir) = sqlite_db().await;
        let before = list_active(&db.pool).await.unwrap();
        let topic = before.iter().find(|t| t.name == "工作压力").unwrap().clone();

        let mut conn = db.pool.acquire().await.unwrap();
        bump_posts_count(&mut conn, "工作压力").await.unwrap();
        bump_posts_count(&mut conn, "no such topic").await.unwrap();
        drop(conn);

        let after = list_active(&db.pool).await.unwrap();
        let bumped = after.iter().find(|t| t.id == topic.id).unwrap();
        assert_eq!(bumped.posts_count, topic.posts_count + 1);
    }
}
