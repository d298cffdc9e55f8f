/// Post repository - posts joined with their author's display columns
use sqlx::{AnyConnection, AnyPool};

use crate::db::now;
use crate::models::Post;
use crate::services::trending::{COMMENT_WEIGHT, LIKE_WEIGHT};

const POST_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.title, p.content, p.images, p.category, p.tags, p.emotion_tags,
           p.likes_count, p.comments_count, p.views_count, p.shares_count, p.visibility,
           p.status, p.is_featured, p.published_at, p.created_at, p.updated_at,
           u.username AS author_username, u.avatar_url AS author_avatar,
           u.membership_level AS author_membership_level
    FROM posts p
    LEFT JOIN users u ON u.id = p.user_id
"#;

/// Read rule for the viewer bound as `$1`: public posts, the viewer's own
/// posts, and friends-only posts of authors the viewer follows.
const VISIBLE_TO_VIEWER: &str = r#"(
    p.visibility = 'public'
    OR p.user_id = $1
    OR (p.visibility = 'friends_only'
        AND EXISTS (SELECT 1 FROM follows f WHERE f.follower_id = $1 AND f.following_id = p.user_id))
)"#;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub images: String,
    pub category: Option<String>,
    pub tags: String,
    pub emotion_tags: String,
    pub visibility: String,
    pub status: String,
}

/// Partial post update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub images: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub emotion_tags: Option<String>,
    pub visibility: Option<String>,
    pub status: Option<String>,
    pub published_at: Option<String>,
}

/// Optional filters for the public listing
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

enum BindValue {
    Text(String),
    Int(i64),
}

/// WHERE-clause accumulator producing `$N` placeholders in bind order.
struct Conditions {
    clauses: Vec<String>,
    binds: Vec<BindValue>,
}

impl Conditions {
    fn new(fixed: &[&str]) -> Self {
        Self {
            clauses: fixed.iter().map(|c| c.to_string()).collect(),
            binds: Vec::new(),
        }
    }

    fn fixed(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    /// Add a clause; every `{}` in `template` refers to the new bind.
    fn push(&mut self, template: &str, value: BindValue) {
        self.binds.push(value);
        let placeholder = format!("${}", self.binds.len());
        self.clauses.push(template.replace("{}", &placeholder));
    }

    fn sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    fn next_index(&self) -> usize {
        self.binds.len() + 1
    }
}

async fn fetch_page(
    pool: &AnyPool,
    conditions: &Conditions,
    order_by: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let where_sql = conditions.sql();

    let count_sql = format!("SELECT COUNT(*) FROM posts p WHERE {where_sql}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for value in &conditions.binds {
        count_query = match value {
            BindValue::Text(text) => count_query.bind(text.as_str()),
            BindValue::Int(int) => count_query.bind(*int),
        };
    }
    let total = count_query.fetch_one(pool).await?;

    let idx = conditions.next_index();
    let page_sql = format!(
        "{POST_SELECT} WHERE {where_sql} ORDER BY {order_by} LIMIT ${} OFFSET ${}",
        idx,
        idx + 1
    );
    let mut page_query = sqlx::query_as::<_, Post>(&page_sql);
    for value in &conditions.binds {
        page_query = match value {
            BindValue::Text(text) => page_query.bind(text.as_str()),
            BindValue::Int(int) => page_query.bind(*int),
        };
    }
    let posts = page_query.bind(limit).bind(offset).fetch_all(pool).await?;

    Ok((posts, total))
}

/// Insert a post inside a transaction and return its id
pub async fn create_post(conn: &mut AnyConnection, post: &NewPost) -> Result<i64, sqlx::Error> {
    let now = now();
    let published_at = (post.status == "published").then(|| now.clone());

    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO posts (user_id, title, content, images, category, tags, emotion_tags,
                           visibility, status, published_at, created_at, updated_at)
        VALUES ($1, CAST($2 AS TEXT), $3, $4, CAST($5 AS TEXT), $6, $7, $8, $9, CAST($10 AS TEXT), $11, $11)
        RETURNING id
        "#,
    )
    .bind(post.user_id)
    .bind(post.title.as_deref())
    .bind(&post.content)
    .bind(&post.images)
    .bind(post.category.as_deref())
    .bind(&post.tags)
    .bind(&post.emotion_tags)
    .bind(&post.visibility)
    .bind(&post.status)
    .bind(published_at)
    .bind(&now)
    .fetch_one(&mut *conn)
    .await
}

/// Find a post by id regardless of status
pub async fn find_post_by_id(pool: &AnyPool, id: i64) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Public, published posts, newest first
pub async fn list_public(
    pool: &AnyPool,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let mut conditions = Conditions::new(&["p.status = 'published'", "p.visibility = 'public'"]);

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        conditions.push("p.category = {}", BindValue::Text(category.to_string()));
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
        let quoted = serde_json::to_string(tag).unwrap_or_else(|_| format!("\"{}\"", tag));
        conditions.push("p.tags LIKE {}", BindValue::Text(format!("%{}%", quoted)));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(
            "(LOWER(COALESCE(p.title, '')) LIKE {} OR LOWER(p.content) LIKE {})",
            BindValue::Text(format!("%{}%", search.to_lowercase())),
        );
    }

    fetch_page(pool, &conditions, "p.created_at DESC, p.id DESC", limit, offset).await
}

/// Featured public posts, newest first
pub async fn list_featured(
    pool: &AnyPool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let conditions = Conditions::new(&[
        "p.status = 'published'",
        "p.visibility = 'public'",
        "p.is_featured = 1",
    ]);

    fetch_page(pool, &conditions, "p.created_at DESC, p.id DESC", limit, offset).await
}

/// Public posts created since `since`, ranked by trending score with ties
/// broken by recency
pub async fn list_trending(pool: &AnyPool, since: &str, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        {POST_SELECT}
        WHERE p.status = 'published' AND p.visibility = 'public' AND p.created_at >= $1
        ORDER BY (p.likes_count * {LIKE_WEIGHT} + p.comments_count * {COMMENT_WEIGHT} + p.views_count) DESC,
                 p.created_at DESC, p.id DESC
        LIMIT $2
        "#
    ))
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Posts authored by `owner_id` as seen by a viewer.
///
/// The owner sees every non-deleted post. Others see published posts that are
/// public, plus friends-only posts when `viewer_follows` is set.
pub async fn list_by_user(
    pool: &AnyPool,
    owner_id: i64,
    viewer_is_owner: bool,
    viewer_follows: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let mut conditions = Conditions::new(&[]);
    conditions.push("p.user_id = {}", BindValue::Int(owner_id));

    if viewer_is_owner {
        conditions.fixed("p.status <> 'deleted'");
    } else if viewer_follows {
        conditions.fixed("p.status = 'published'");
        conditions.fixed("p.visibility IN ('public', 'friends_only')");
    } else {
        conditions.fixed("p.status = 'published'");
        conditions.fixed("p.visibility = 'public'");
    }

    fetch_page(pool, &conditions, "p.created_at DESC, p.id DESC", limit, offset).await
}

/// Published posts by users `viewer_id` follows, plus featured public posts
pub async fn list_premium_feed(
    pool: &AnyPool,
    viewer_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let mut conditions = Conditions::new(&["p.status = 'published'"]);
    conditions.push(
        r#"(
            (p.visibility IN ('public', 'friends_only')
             AND p.user_id IN (SELECT following_id FROM follows WHERE follower_id = {}))
            OR (p.is_featured = 1 AND p.visibility = 'public')
        )"#,
        BindValue::Int(viewer_id),
    );

    fetch_page(pool, &conditions, "p.created_at DESC, p.id DESC", limit, offset).await
}

/// Published posts bookmarked by `user_id` that the user may still read,
/// most recently bookmarked first.
///
/// A bookmark outlives later visibility changes, so the read rule is applied
/// here rather than when the bookmark was made.
pub async fn list_bookmarked(
    pool: &AnyPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COUNT(*) FROM bookmarks b
        JOIN posts p ON p.id = b.post_id
        WHERE b.user_id = $1 AND p.status = 'published' AND {VISIBLE_TO_VIEWER}
        "#
    ))
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let posts = sqlx::query_as::<_, Post>(&format!(
        r#"
        {POST_SELECT}
        JOIN bookmarks b ON b.post_id = p.id
        WHERE b.user_id = $1 AND p.status = 'published' AND {VISIBLE_TO_VIEWER}
        ORDER BY b.created_at DESC, b.id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((posts, total))
}

/// Apply a partial update inside a transaction
pub async fn update_post(
    conn: &mut AnyConnection,
    id: i64,
    changes: &PostChanges,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts SET
            title = COALESCE(CAST($2 AS TEXT), title),
            content = COALESCE(CAST($3 AS TEXT), content),
            images = COALESCE(CAST($4 AS TEXT), images),
            category = COALESCE(CAST($5 AS TEXT), category),
            tags = COALESCE(CAST($6 AS TEXT), tags),
            emotion_tags = COALESCE(CAST($7 AS TEXT), emotion_tags),
            visibility = COALESCE(CAST($8 AS TEXT), visibility),
            status = COALESCE(CAST($9 AS TEXT), status),
            published_at = COALESCE(published_at, CAST($10 AS TEXT)),
            updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(changes.title.as_deref())
    .bind(changes.content.as_deref())
    .bind(changes.images.as_deref())
    .bind(changes.category.as_deref())
    .bind(changes.tags.as_deref())
    .bind(changes.emotion_tags.as_deref())
    .bind(changes.visibility.as_deref())
    .bind(changes.status.as_deref())
    .bind(changes.published_at.as_deref())
    .bind(now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Mark a post deleted. Returns whether a live post was changed.
pub async fn soft_delete(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE posts SET status = 'deleted', updated_at = $1 WHERE id = $2 AND status <> 'deleted'",
    )
    .bind(now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn increment_views(pool: &AnyPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE posts SET views_count = views_count + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Which per-post counter to adjust
#[derive(Debug, Clone, Copy)]
pub enum PostCounter {
    Likes,
    Comments,
}

impl PostCounter {
    fn column(&self) -> &'static str {
        match self {
            PostCounter::Likes => "likes_count",
            PostCounter::Comments => "comments_count",
        }
    }
}

pub async fn increment_counter(
    conn: &mut AnyConnection,
    id: i64,
    counter: PostCounter,
) -> Result<(), sqlx::Error> {
    let column = counter.column();
    sqlx::query(&format!("UPDATE posts SET {column} = {column} + 1 WHERE id = $1"))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Decrement a counter, never below zero
pub async fn decrement_counter(
    conn: &mut AnyConnection,
    id: i64,
    counter: PostCounter,
) -> Result<(), sqlx::Error> {
    let column = counter.column();
    sqlx::query(&format!(
        "UPDATE posts SET {column} = CASE WHEN {column} > 0 THEN {column} - 1 ELSE 0 END WHERE id = $1"
    ))
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
