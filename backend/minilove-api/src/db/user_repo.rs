/// User repository - handles all database operations for users
use sqlx::{AnyConnection, AnyPool};

use crate::db::now;
use crate::models::{User, UserStats};

const USER_COLUMNS: &str = r#"
    id, username, email, phone, password_hash, avatar_url, bio, gender, age, city,
    membership_level, membership_expires_at, role, posts_count, comments_count,
    likes_given_count, likes_received_count, is_active, is_verified, created_at, updated_at
"#;

/// Fields accepted at registration
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub gender: &'a str,
    pub age: Option<i64>,
    pub city: Option<&'a str>,
}

/// Partial profile update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i64>,
    pub city: Option<String>,
}

/// Create a new user in the database
pub async fn create_user(pool: &AnyPool, new_user: &NewUser<'_>) -> Result<User, sqlx::Error> {
    let now = now();

    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, phone, password_hash, gender, age, city, created_at, updated_at)
        VALUES ($1, $2, CAST($3 AS TEXT), $4, $5, CAST($6 AS BIGINT), CAST($7 AS TEXT), $8, $8)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(new_user.username)
    .bind(new_user.email.to_lowercase())
    .bind(new_user.phone)
    .bind(new_user.password_hash)
    .bind(new_user.gender)
    .bind(new_user.age)
    .bind(new_user.city)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Find a user by id
pub async fn find_by_id(pool: &AnyPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Find a user by username or (case-insensitive) email
pub async fn find_by_username_or_email(
    pool: &AnyPool,
    identifier: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2"
    ))
    .bind(identifier)
    .bind(identifier.to_lowercase())
    .fetch_optional(pool)
    .await
}

async fn exists(pool: &AnyPool, sql: &str, value: &str, exclude_id: Option<i64>) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(sql)
        .bind(value)
        .bind(exclude_id.unwrap_or(0))
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Check if a username is taken by anyone other than `exclude_id`
pub async fn username_exists(
    pool: &AnyPool,
    username: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    exists(
        pool,
        "SELECT id FROM users WHERE username = $1 AND id <> $2 LIMIT 1",
        username,
        exclude_id,
    )
    .await
}

/// Check if an email is taken by anyone other than `exclude_id`
pub async fn email_exists(
    pool: &AnyPool,
    email: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    exists(
        pool,
        "SELECT id FROM users WHERE email = $1 AND id <> $2 LIMIT 1",
        &email.to_lowercase(),
        exclude_id,
    )
    .await
}

/// Check if a phone number is taken by anyone other than `exclude_id`
pub async fn phone_exists(
    pool: &AnyPool,
    phone: &str,
    exclude_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    exists(
        pool,
        "SELECT id FROM users WHERE phone = $1 AND id <> $2 LIMIT 1",
        phone,
        exclude_id,
    )
    .await
}

/// Apply a partial profile update and return the updated row
pub async fn update_profile(
    pool: &AnyPool,
    id: i64,
    changes: &ProfileChanges,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users SET
            username = COALESCE(CAST($2 AS TEXT), username),
            email = COALESCE(CAST($3 AS TEXT), email),
            phone = COALESCE(CAST($4 AS TEXT), phone),
            avatar_url = COALESCE(CAST($5 AS TEXT), avatar_url),
            bio = COALESCE(CAST($6 AS TEXT), bio),
            gender = COALESCE(CAST($7 AS TEXT), gender),
            age = COALESCE(CAST($8 AS BIGINT), age),
            city = COALESCE(CAST($9 AS TEXT), city),
            updated_at = $10
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(changes.username.as_deref())
    .bind(changes.email.as_ref().map(|e| e.to_lowercase()))
    .bind(changes.phone.as_deref())
    .bind(changes.avatar_url.as_deref())
    .bind(changes.bio.as_deref())
    .bind(changes.gender.as_deref())
    .bind(changes.age)
    .bind(changes.city.as_deref())
    .bind(now())
    .fetch_one(pool)
    .await
}

/// Replace the stored password hash
pub async fn update_password(pool: &AnyPool, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(password_hash)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Activate or deactivate an account
pub async fn set_active(pool: &AnyPool, id: i64, is_active: bool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = $1, updated_at = $2 WHERE id = $3 RETURNING {USER_COLUMNS}"
    ))
    .bind(i64::from(is_active))
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Page through all users, newest first
pub async fn list_users(pool: &AnyPool, limit: i64, offset: i64) -> Result<(Vec<User>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

/// Search active users whose username or bio contains `keyword` (case-insensitive)
pub async fn search_users(
    pool: &AnyPool,
    keyword: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let pattern = format!("%{}%", keyword.to_lowercase());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM users
        WHERE is_active = 1 AND (LOWER(username) LIKE $1 OR LOWER(COALESCE(bio, '')) LIKE $1)
        "#,
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE is_active = 1 AND (LOWER(username) LIKE $1 OR LOWER(COALESCE(bio, '')) LIKE $1)
        ORDER BY username ASC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

/// Aggregate activity counters for a user
pub async fn get_stats(pool: &AnyPool, id: i64) -> Result<UserStats, sqlx::Error> {
    let (posts, comments, likes_given, post_likes, comment_likes, followers, following): (
        i64,
        i64,
        i64,
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = $1 AND status = 'published'),
            (SELECT COUNT(*) FROM comments WHERE user_id = $1 AND status = 'published'),
            (SELECT COUNT(*) FROM likes WHERE user_id = $1),
            (SELECT COUNT(*) FROM likes l JOIN posts p ON l.post_id = p.id WHERE p.user_id = $1),
            (SELECT COUNT(*) FROM likes l JOIN comments c ON l.comment_id = c.id WHERE c.user_id = $1),
            (SELECT COUNT(*) FROM follows WHERE following_id = $1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(UserStats {
        posts,
        comments,
        likes_given,
        likes_received: post_likes + comment_likes,
        followers,
        following,
    })
}

// ============================================
// Denormalized counters (run inside transactions)
// ============================================

/// Which per-user counter to adjust
#[derive(Debug, Clone, Copy)]
pub enum UserCounter {
    Posts,
    Comments,
    LikesGiven,
    LikesReceived,
}

impl UserCounter {
    fn column(&self) -> &'static str {
        match self {
            UserCounter::Posts => "posts_count",
            UserCounter::Comments => "comments_count",
            UserCounter::LikesGiven => "likes_given_count",
            UserCounter::LikesReceived => "likes_received_count",
        }
    }
}

pub async fn increment_counter(
    conn: &mut AnyConnection,
    id: i64,
    counter: UserCounter,
) -> Result<(), sqlx::Error> {
    let column = counter.column();
    sqlx::query(&format!("UPDATE users SET {column} = {column} + 1 WHERE id = $1"))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Decrement a counter, never below zero
pub async fn decrement_counter(
    conn: &mut AnyConnection,
    id: i64,
    counter: UserCounter,
) -> Result<(), sqlx::Error> {
    let column = counter.column();
    sqlx::query(&format!(
        "UPDATE users SET {column} = CASE WHEN {column} > 0 THEN {column} - 1 ELSE 0 END WHERE id = $1"
    ))
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::sqlite_db;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password_hash: "hash",
            phone: None,
            gender: "unknown",
            age: None,
            city: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (db, _dir) = sqlite_db().await;

        let user = create_user(&db.pool, &new_user("alice", "Alice@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.membership_level, "free");
        assert_eq!(user.role, "user");
        assert!(user.is_active);

        let by_email = find_by_username_or_email(&db.pool, "ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_name = find_by_username_or_email(&db.pool, "alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let (db, _dir) = sqlite_db().await;
        create_user(&db.pool, &new_user("bob", "bob@example.com")).await.unwrap();

        let err = create_user(&db.pool, &new_user("bob", "other@example.com"))
            .await
            .unwrap_err();
        assert!(err
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn test_exists_checks_exclude_self() {
        let (db, _dir) = sqlite_db().await;
        let user = create_user(&db.pool, &new_user("carol", "carol@example.com"))
            .await
            .unwrap();

        assert!(username_exists(&db.pool, "carol", None).await.unwrap());
        assert!(!username_exists(&db.pool, "carol", Some(user.id)).await.unwrap());
        assert!(email_exists(&db.pool, "CAROL@example.com", None).await.unwrap());
        assert!(!phone_exists(&db.pool, "123", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_partial_profile_update_keeps_other_fields() {
        let (db, _dir) = sqlite_db().await;
        let user = create_user(&db.pool, &new_user("dave", "dave@example.com"))
            .await
            .unwrap();

        let changes = ProfileChanges {
            bio: Some("hello".to_string()),
            age: Some(30),
            ..Default::default()
        };
        let updated = update_profile(&db.pool, user.id, &changes).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.age, Some(30));
        assert_eq!(updated.username, "dave");
        assert_eq!(updated.email, "dave@example.com");
    }

    #[tokio::test]
    async fn test_counter_decrement_floors_at_zero() {
        let (db, _dir) = sqlite_db().await;
        let user = create_user(&db.pool, &new_user("erin", "erin@example.com"))
            .await
            .unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        decrement_counter(&mut conn, user.id, UserCounter::Posts).await.unwrap();
        increment_counter(&mut conn, user.id, UserCounter::Comments).await.unwrap();
        drop(conn);

        let user = find_by_id(&db.pool, user.id).await.unwrap().unwrap();
        assert_eq!(user.posts_count, 0);
        assert_eq!(user.comments_count, 1);
    }

    #[tokio::test]
    async fn test_search_matches_username_and_bio() {
        let (db, _dir) = sqlite_db().await;
        create_user(&db.pool, &new_user("moonlight", "m@example.com")).await.unwrap();
        let other = create_user(&db.pool, &new_user("sunny", "s@example.com")).await.unwrap();
        update_profile(
            &db.pool,
            other.id,
            &ProfileChanges {
                bio: Some("I love the Moon".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (users, total) = search_users(&db.pool, "moon", 20, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(users.len(), 2);
    }
}
