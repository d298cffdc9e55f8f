//! Read-access rules for posts.
use sqlx::AnyPool;

use crate::db::follow_repo;
use crate::error::{AppError, Result};
use crate::models::{Post, Visibility};

/// Decide whether `viewer` may read content owned by `owner_id`.
///
/// `is_follower` only matters for friends-only content and should report
/// whether the viewer follows the owner.
pub fn check_access(
    visibility: Visibility,
    owner_id: i64,
    viewer: Option<i64>,
    is_follower: bool,
) -> Result<()> {
    if visibility == Visibility::Public {
        return Ok(());
    }

    let viewer = viewer.ok_or_else(|| {
        AppError::Authentication("Sign in to view this content".to_string())
    })?;

    if viewer == owner_id {
        return Ok(());
    }

    match visibility {
        Visibility::Private => Err(AppError::Authorization(
            "This content is private".to_string(),
        )),
        Visibility::FriendsOnly if is_follower => Ok(()),
        Visibility::FriendsOnly => Err(AppError::Authorization(
            "Only followers can view this content".to_string(),
        )),
        Visibility::Public => Ok(()),
    }
}

/// Enforce the visibility of `post` for `viewer`, consulting the follow graph
/// only when needed.
pub async fn ensure_post_visible(pool: &AnyPool, post: &Post, viewer: Option<i64>) -> Result<()> {
    let visibility: Visibility = post
        .visibility
        .parse()
        .map_err(AppError::Internal)?;

    let is_follower = match (visibility, viewer) {
        (Visibility::FriendsOnly, Some(viewer_id)) if viewer_id != post.user_id => {
            follow_repo::is_following(pool, viewer_id, post.user_id).await?
        }
        _ => false,
    };

    check_access(visibility, post.user_id, viewer, is_follower)
}
