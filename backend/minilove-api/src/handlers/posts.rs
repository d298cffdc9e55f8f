use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;
use std::collections::HashMap;
use tracing::{debug, info};
use validator::Validate;

use super::catalog::TopicCatalog;
use super::PageQuery;
use crate::db::like_repo::LikeTarget;
use crate::db::post_repo::{NewPost, PostChanges, PostCounter, PostFilter};
use crate::db::user_repo::UserCounter;
use crate::db::{self, bookmark_repo, comment_repo, follow_repo, like_repo, post_repo, topic_repo, user_repo};
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, MaybeUser};
use crate::models::{
    encode_string_list, ApiResponse, CommentList, CommentResponse, CounterResponse, Pagination, Post,
    PostEnvelope, PostList, PostResponse, PostStatus, Role, Visibility,
};
use crate::services::{emotion, trending, visibility};

// ============================================
// Request/Response Structs
// ============================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 10, max = 5000))]
    pub content: String,

    #[validate(length(max = 50))]
    pub category: Option<String>,

    #[validate(custom(function = "crate::validators::validate_tags"))]
    pub tags: Option<Vec<String>>,

    #[validate(length(max = 9))]
    pub images: Option<Vec<String>>,

    pub visibility: Option<Visibility>,

    #[validate(custom(function = "crate::validators::validate_post_status"))]
    pub status: Option<PostStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 10, max = 5000))]
    pub content: Option<String>,

    #[validate(length(max = 50))]
    pub category: Option<String>,

    #[validate(custom(function = "crate::validators::validate_tags"))]
    pub tags: Option<Vec<String>>,

    #[validate(length(max = 9))]
    pub images: Option<Vec<String>>,

    pub visibility: Option<Visibility>,

    #[validate(custom(function = "crate::validators::validate_post_status"))]
    pub status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub timeframe: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrendingList {
    pub posts: Vec<PostResponse>,
    pub timeframe: &'static str,
}

const COMMENTS_PAGE_SIZE: i64 = 50;
const PREMIUM_TOPICS_LIMIT: i64 = 10;

// ============================================
// Helpers
// ============================================

fn post_list(posts: Vec<Post>, total: i64, page: i64, limit: i64) -> PostList {
    PostList {
        posts: posts.into_iter().map(PostResponse::from).collect(),
        pagination: Pagination::new(total, page, limit),
    }
}

/// A post that has not been soft-deleted
async fn live_post(pool: &AnyPool, id: i64) -> Result<Post> {
    match post_repo::find_post_by_id(pool, id).await? {
        Some(post) if post.status != PostStatus::Deleted.as_str() => Ok(post),
        _ => Err(AppError::NotFound("Post not found".to_string())),
    }
}

/// A post the viewer may read: drafts and archived posts are only visible to
/// their author, and the visibility tier is enforced for everyone else.
pub(super) async fn readable_post(pool: &AnyPool, id: i64, viewer: Option<i64>) -> Result<Post> {
    let post = live_post(pool, id).await?;

    if post.status != PostStatus::Published.as_str() && viewer != Some(post.user_id) {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    visibility::ensure_post_visible(pool, &post, viewer).await?;
    Ok(post)
}

/// Like/bookmark targets must be published as well as readable
pub(super) async fn interactable_post(pool: &AnyPool, id: i64, viewer: i64) -> Result<Post> {
    let post = readable_post(pool, id, Some(viewer)).await?;
    if post.status != PostStatus::Published.as_str() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    Ok(post)
}

async fn likes_count(pool: &AnyPool, id: i64) -> Result<i64> {
    Ok(live_post(pool, id).await?.likes_count)
}

// ============================================
// Public reads (optional auth)
// ============================================

/// GET /api/v1/posts
pub async fn list_posts(
    pool: web::Data<AnyPool>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let (page, limit, offset) = db::page_bounds(query.page, query.limit, super::DEFAULT_PAGE_SIZE);
    let filter = PostFilter {
        category: query.category,
        tag: query.tag,
        search: query.search,
    };

    let (posts, total) = post_repo::list_public(&pool, &filter, limit, offset).await?;
    debug!(total, page, "listed public posts");

    Ok(HttpResponse::Ok().json(ApiResponse::data(post_list(posts, total, page, limit))))
}

/// GET /api/v1/posts/featured
pub async fn featured(pool: web::Data<AnyPool>, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    let (page, limit, offset) = query.bounds();
    let (posts, total) = post_repo::list_featured(&pool, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(post_list(posts, total, page, limit))))
}

/// GET /api/v1/posts/trending
pub async fn trending_posts(
    pool: web::Data<AnyPool>,
    query: web::Query<TrendingQuery>,
) -> Result<HttpResponse> {
    let timeframe = trending::Timeframe::parse(query.timeframe.as_deref())?;
    let limit = query.limit.unwrap_or(super::DEFAULT_PAGE_SIZE).clamp(1, 100);

    let posts = post_repo::list_trending(&pool, &timeframe.since(), limit).await?;
    let posts = posts
        .into_iter()
        .map(|post| {
            let score = trending::score(post.likes_count, post.comments_count, post.views_count);
            let mut response = PostResponse::from(post);
            response.trending_score = Some(score);
            response
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::data(TrendingList {
        posts,
        timeframe: timeframe.as_str(),
    })))
}

/// GET /api/v1/posts/{id}
pub async fn get_post(
    pool: web::Data<AnyPool>,
    viewer: MaybeUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let mut post = readable_post(&pool, path.into_inner(), viewer.id()).await?;

    post_repo::increment_views(&pool, post.id).await?;
    post.views_count += 1;

    let mut response = PostResponse::from(post);
    if let Some(viewer_id) = viewer.id() {
        response.is_liked =
            Some(like_repo::has_liked(&pool, viewer_id, LikeTarget::Post(response.id)).await?);
        response.is_bookmarked =
            Some(bookmark_repo::is_bookmarked(&pool, viewer_id, response.id).await?);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::data(PostEnvelope { post: response })))
}

/// GET /api/v1/posts/{id}/comments
pub async fn list_comments(
    pool: web::Data<AnyPool>,
    viewer: MaybeUser,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let post = readable_post(&pool, path.into_inner(), viewer.id()).await?;
    let (page, limit, offset) = db::page_bounds(query.page, query.limit, COMMENTS_PAGE_SIZE);

    let (top_level, total) = comment_repo::list_top_level(&pool, post.id, limit, offset).await?;

    let mut replies: HashMap<i64, Vec<CommentResponse>> = HashMap::new();
    for reply in comment_repo::list_replies(&pool, post.id).await? {
        if let Some(parent_id) = reply.parent_id {
            replies
                .entry(parent_id)
                .or_default()
                .push(CommentResponse::from(reply));
        }
    }

    let comments = top_level
        .into_iter()
        .map(|comment| {
            let mut response = CommentResponse::from(comment);
            response.replies = replies.remove(&response.id).unwrap_or_default();
            response.reply_count = response.replies.len() as i64;
            response
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::data(CommentList {
        comments,
        pagination: Pagination::new(total, page, limit),
    })))
}

/// GET /api/v1/posts/user/{userId}
pub async fn list_user_posts(
    pool: web::Data<AnyPool>,
    viewer: MaybeUser,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let owner_id = path.into_inner();
    if user_repo::find_by_id(&pool, owner_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let viewer_is_owner = viewer.id() == Some(owner_id);
    let viewer_follows = match viewer.id() {
        Some(viewer_id) if !viewer_is_owner => {
            follow_repo::is_following(&pool, viewer_id, owner_id).await?
        }
        _ => false,
    };

    let (page, limit, offset) = query.bounds();
    let (posts, total) =
        post_repo::list_by_user(&pool, owner_id, viewer_is_owner, viewer_follows, limit, offset)
            .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(post_list(posts, total, page, limit))))
}

// ============================================
// Authoring (auth)
// ============================================

/// POST /api/v1/posts
pub async fn create_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let status = req.status.unwrap_or(PostStatus::Published);
    let new_post = NewPost {
        user_id: auth.id,
        title: req.title,
        emotion_tags: encode_string_list(&emotion::analyze(&req.content)),
        content: req.content,
        images: encode_string_list(&req.images.unwrap_or_default()),
        category: req.category.filter(|c| !c.is_empty()),
        tags: encode_string_list(&req.tags.unwrap_or_default()),
        visibility: req.visibility.unwrap_or(Visibility::Public).as_str().to_string(),
        status: status.as_str().to_string(),
    };

    let post_id = db::transaction(&pool, move |conn| {
        Box::pin(async move {
            let id = post_repo::create_post(conn, &new_post).await?;
            if status == PostStatus::Published {
                user_repo::increment_counter(conn, new_post.user_id, UserCounter::Posts).await?;
                if let Some(category) = new_post.category.as_deref() {
                    topic_repo::bump_posts_count(conn, category).await?;
                }
            }
            Ok::<_, AppError>(id)
        })
    })
    .await?;

    let post = live_post(&pool, post_id).await?;
    info!(post_id, user_id = auth.id, status = %post.status, "post created");

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Post created",
        PostEnvelope {
            post: PostResponse::from(post),
        },
    )))
}

/// PUT /api/v1/posts/{id}
pub async fn update_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let post = live_post(&pool, path.into_inner()).await?;
    if post.user_id != auth.id {
        return Err(AppError::Authorization(
            "You can only edit your own posts".to_string(),
        ));
    }

    let req = req.into_inner();
    let was_published = post.status == PostStatus::Published.as_str();
    let now_published = match req.status {
        Some(status) => status == PostStatus::Published,
        None => was_published,
    };

    let changes = PostChanges {
        title: req.title,
        emotion_tags: req
            .content
            .as_deref()
            .map(|content| encode_string_list(&emotion::analyze(content))),
        content: req.content,
        images: req.images.as_deref().map(encode_string_list),
        category: req.category,
        tags: req.tags.as_deref().map(encode_string_list),
        visibility: req.visibility.map(|v| v.as_str().to_string()),
        status: req.status.map(|s| s.as_str().to_string()),
        published_at: now_published.then(db::now),
    };

    let post_id = post.id;
    let owner_id = post.user_id;
    let old_category = post.category.clone();
    let new_category = changes.category.clone().or(post.category.clone());

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            post_repo::update_post(conn, post_id, &changes).await?;

            match (was_published, now_published) {
                (false, true) => {
                    user_repo::increment_counter(conn, owner_id, UserCounter::Posts).await?;
                    if let Some(category) = new_category.as_deref() {
                        topic_repo::bump_posts_count(conn, category).await?;
                    }
                }
                (true, false) => {
                    user_repo::decrement_counter(conn, owner_id, UserCounter::Posts).await?;
                    if let Some(category) = old_category.as_deref() {
                        topic_repo::drop_posts_count(conn, category).await?;
                    }
                }
                // A published post counts under its current category only
                (true, true) if old_category != new_category => {
                    if let Some(category) = old_category.as_deref() {
                        topic_repo::drop_posts_count(conn, category).await?;
                    }
                    if let Some(category) = new_category.as_deref() {
                        topic_repo::bump_posts_count(conn, category).await?;
                    }
                }
                _ => {}
            }
            Ok::<_, AppError>(())
        })
    })
    .await?;

    let post = live_post(&pool, post_id).await?;
    info!(post_id, user_id = auth.id, "post updated");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Post updated",
        PostEnvelope {
            post: PostResponse::from(post),
        },
    )))
}

/// DELETE /api/v1/posts/{id}
pub async fn delete_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = live_post(&pool, path.into_inner()).await?;
    if post.user_id != auth.id {
        return Err(AppError::Authorization(
            "You can only delete your own posts".to_string(),
        ));
    }

    let post_id = post.id;
    let owner_id = post.user_id;
    let was_published = post.status == PostStatus::Published.as_str();
    let category = post.category.clone();

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if !post_repo::soft_delete(conn, post_id).await? {
                return Err(AppError::NotFound("Post not found".to_string()));
            }
            if was_published {
                user_repo::decrement_counter(conn, owner_id, UserCounter::Posts).await?;
                if let Some(category) = category.as_deref() {
                    topic_repo::drop_posts_count(conn, category).await?;
                }
            }
            Ok::<_, AppError>(())
        })
    })
    .await?;

    info!(post_id, user_id = auth.id, "post deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Post deleted")))
}

// ============================================
// Likes & bookmarks (auth)
// ============================================

/// POST /api/v1/posts/{id}/like
pub async fn like_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = interactable_post(&pool, path.into_inner(), auth.id).await?;
    let (post_id, author_id, user_id) = (post.id, post.user_id, auth.id);

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if like_repo::create_like(conn, user_id, LikeTarget::Post(post_id))
                .await?
                .is_none()
            {
                return Err(AppError::Conflict("You have already liked this post".to_string()));
            }
            post_repo::increment_counter(conn, post_id, PostCounter::Likes).await?;
            user_repo::increment_counter(conn, user_id, UserCounter::LikesGiven).await?;
            user_repo::increment_counter(conn, author_id, UserCounter::LikesReceived).await?;
            Ok::<_, AppError>(())
        })
    })
    .await?;

    debug!(post_id, user_id, "post liked");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Liked",
        CounterResponse {
            likes_count: likes_count(&pool, post_id).await?,
        },
    )))
}

/// DELETE /api/v1/posts/{id}/like
pub async fn unlike_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = live_post(&pool, path.into_inner()).await?;
    let (post_id, author_id, user_id) = (post.id, post.user_id, auth.id);

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if !like_repo::delete_like(conn, user_id, LikeTarget::Post(post_id)).await? {
                return Err(AppError::NotFound("You have not liked this post".to_string()));
            }
            post_repo::decrement_counter(conn, post_id, PostCounter::Likes).await?;
            user_repo::decrement_counter(conn, user_id, UserCounter::LikesGiven).await?;
            user_repo::decrement_counter(conn, author_id, UserCounter::LikesReceived).await?;
            Ok::<_, AppError>(())
        })
    })
    .await?;

    debug!(post_id, user_id, "post unliked");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Like removed",
        CounterResponse {
            likes_count: likes_count(&pool, post_id).await?,
        },
    )))
}

/// POST /api/v1/posts/{id}/bookmark
pub async fn bookmark_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = interactable_post(&pool, path.into_inner(), auth.id).await?;

    if bookmark_repo::create_bookmark(&pool, auth.id, post.id).await?.is_none() {
        return Err(AppError::Conflict("Post already bookmarked".to_string()));
    }

    debug!(post_id = post.id, user_id = auth.id, "post bookmarked");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Bookmarked")))
}

/// DELETE /api/v1/posts/{id}/bookmark
pub async fn unbookmark_post(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();

    if !bookmark_repo::delete_bookmark(&pool, auth.id, post_id).await? {
        return Err(AppError::NotFound("Bookmark not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::message("Bookmark removed")))
}

/// GET /api/v1/posts/bookmarks
pub async fn list_bookmarks(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let (page, limit, offset) = query.bounds();
    let (posts, total) = post_repo::list_bookmarked(&pool, auth.id, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(post_list(posts, total, page, limit))))
}

// ============================================
// Premium (role premium or admin)
// ============================================

/// GET /api/v1/posts/premium/feed
pub async fn premium_feed(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    auth.require_role(&[Role::Premium, Role::Admin])?;

    let (page, limit, offset) = query.bounds();
    let (posts, total) = post_repo::list_premium_feed(&pool, auth.id, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(post_list(posts, total, page, limit))))
}

/// GET /api/v1/posts/premium/topics
pub async fn premium_topics(pool: web::Data<AnyPool>, auth: AuthUser) -> Result<HttpResponse> {
    auth.require_role(&[Role::Premium, Role::Admin])?;

    let topics = topic_repo::list_featured(&pool, PREMIUM_TOPICS_LIMIT).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(TopicCatalog { topics })))
}
