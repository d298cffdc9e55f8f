use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::AnyPool;
use tracing::{debug, info};
use validator::Validate;

use super::posts::interactable_post;
use crate::db::like_repo::LikeTarget;
use crate::db::post_repo::PostCounter;
use crate::db::user_repo::UserCounter;
use crate::db::{self, comment_repo, like_repo, post_repo, user_repo};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{ApiResponse, Comment, CommentEnvelope, CommentResponse, CounterResponse};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: i64,

    #[validate(length(min = 2, max = 2000))]
    pub content: String,

    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 2, max = 2000))]
    pub content: String,
}

const DELETED: &str = "deleted";
const PUBLISHED: &str = "published";

async fn find_comment(pool: &AnyPool, id: i64) -> Result<Comment> {
    comment_repo::find_comment_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Likes only apply to comments that are still published
async fn published_comment(pool: &AnyPool, id: i64) -> Result<Comment> {
    let comment = find_comment(pool, id).await?;
    if comment.status != PUBLISHED {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    Ok(comment)
}

/// POST /api/v1/comments
pub async fn create_comment(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    req: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let req = req.into_inner();

    let post = interactable_post(&pool, req.post_id, auth.id).await?;

    if let Some(parent_id) = req.parent_id {
        let parent = match comment_repo::find_comment_by_id(&pool, parent_id).await? {
            Some(parent) if parent.status != DELETED => parent,
            _ => return Err(AppError::NotFound("Parent comment not found".to_string())),
        };
        if parent.post_id != post.id {
            return Err(AppError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
    }

    let (post_id, user_id, parent_id) = (post.id, auth.id, req.parent_id);
    let content = req.content;

    let comment_id = db::transaction(&pool, move |conn| {
        Box::pin(async move {
            let id = comment_repo::create_comment(conn, post_id, user_id, parent_id, &content).await?;
            post_repo::increment_counter(conn, post_id, PostCounter::Comments).await?;
            user_repo::increment_counter(conn, user_id, UserCounter::Comments).await?;
            Ok::<_, AppError>(id)
        })
    })
    .await?;

    let comment = find_comment(&pool, comment_id).await?;
    info!(comment_id, post_id, user_id, "comment created");

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Comment created",
        CommentEnvelope {
            comment: CommentResponse::from(comment),
        },
    )))
}

/// PUT /api/v1/comments/{id}
pub async fn update_comment(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
    req: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let comment = find_comment(&pool, path.into_inner()).await?;

    if comment.user_id != auth.id {
        return Err(AppError::Authorization(
            "You can only edit your own comments".to_string(),
        ));
    }
    if comment.status == DELETED {
        return Err(AppError::BadRequest("Comment has been deleted".to_string()));
    }

    let comment = comment_repo::update_content(&pool, comment.id, &req.content)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    info!(comment_id = comment.id, user_id = auth.id, "comment updated");
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Comment updated",
        CommentEnvelope {
            comment: CommentResponse::from(comment),
        },
    )))
}

/// DELETE /api/v1/comments/{id}
///
/// Only the comment's author may delete it.
pub async fn delete_comment(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let comment = find_comment(&pool, path.into_inner()).await?;
    if comment.status == DELETED {
        return Err(AppError::BadRequest("Comment already deleted".to_string()));
    }

    if comment.user_id != auth.id {
        return Err(AppError::Authorization(
            "You can only delete your own comments".to_string(),
        ));
    }

    let (comment_id, post_id, author_id) = (comment.id, comment.post_id, comment.user_id);
    let was_published = comment.status == PUBLISHED;

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if !comment_repo::soft_delete(conn, comment_id).await? {
                return Err(AppError::BadRequest("Comment already deleted".to_string()));
            }
            if was_published {
                post_repo::decrement_counter(conn, post_id, PostCounter::Comments).await?;
                user_repo::decrement_counter(conn, author_id, UserCounter::Comments).await?;
            }
            Ok::<_, AppError>(())
        })
    })
    .await?;

    info!(comment_id, user_id = auth.id, "comment deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Comment deleted")))
}

/// POST /api/v1/comments/{id}/like
pub async fn like_comment(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let comment = published_comment(&pool, path.into_inner()).await?;
    let (comment_id, author_id, user_id) = (comment.id, comment.user_id, auth.id);

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if like_repo::create_like(conn, user_id, LikeTarget::Comment(comment_id))
                .await?
                .is_none()
            {
                return Err(AppError::Conflict(
                    "You have already liked this comment".to_string(),
                ));
            }
            comment_repo::increment_likes(conn, comment_id).await?;
            user_repo::increment_counter(conn, user_id, UserCounter::LikesGiven).await?;
            user_repo::increment_counter(conn, author_id, UserCounter::LikesReceived).await?;
            Ok::<_, AppError>(())
        })
    })
    .await?;

    debug!(comment_id, user_id, "comment liked");
    let likes_count = find_comment(&pool, comment_id).await?.likes_count;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Liked",
        CounterResponse { likes_count },
    )))
}

/// DELETE /api/v1/comments/{id}/like
pub async fn unlike_comment(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let comment = find_comment(&pool, path.into_inner()).await?;
    let (comment_id, author_id, user_id) = (comment.id, comment.user_id, auth.id);

    db::transaction(&pool, move |conn| {
        Box::pin(async move {
            if !like_repo::delete_like(conn, user_id, LikeTarget::Comment(comment_id)).await? {
                return Err(AppError::NotFound(
                    "You have not liked this comment".to_string(),
                ));
            }
            comment_repo::decrement_likes(conn, comment_id).await?;
            user_repo::decrement_counter(conn, user_id, UserCounter::LikesGiven).await?;
            user_repo::decrement_counter(conn, author_id, UserCounter::LikesReceived).await?;
            Ok::<_, AppError>(())
        })
    })
    .await?;

    debug!(comment_id, user_id, "comment unliked");
    let likes_count = find_comment(&pool, comment_id).await?.likes_count;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Like removed",
        CounterResponse { likes_count },
    )))
}
