/// User profiles, search, the follow graph and admin account management
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::AnyPool;
use tracing::info;
use validator::Validate;

use super::PageQuery;
use crate::db::{follow_repo, user_repo};
use crate::error::{AppError, Result};
use crate::handlers::auth::current_user;
use crate::middleware::AuthUser;
use crate::models::{
    ApiResponse, Gender, Pagination, PublicUser, Role, User, UserEnvelope, UserList, UserProfile,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[validate(length(max = 500))]
    pub bio: Option<String>,

    pub gender: Option<Gender>,

    #[validate(range(min = 18, max = 100))]
    pub age: Option<i64>,

    #[validate(length(max = 100))]
    pub city: Option<String>,

    #[validate(length(max = 500))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub is_active: bool,
}

fn user_list(users: Vec<User>, total: i64, page: i64, limit: i64) -> UserList {
    UserList {
        users: users.into_iter().map(PublicUser::from).collect(),
        pagination: Pagination::new(total, page, limit),
    }
}

async fn existing_user(pool: &AnyPool, id: i64) -> Result<User> {
    user_repo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// GET /api/v1/users/me
pub async fn me(pool: web::Data<AnyPool>, auth: AuthUser) -> Result<HttpResponse> {
    let user = current_user(&pool, &auth).await?;
    let stats = user_repo::get_stats(&pool, user.id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(UserEnvelope {
        user: UserProfile::from_user(user, Some(stats)),
    })))
}

/// PUT /api/v1/users/profile
pub async fn update_profile(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    req: web::Json<ProfileUpdateRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    current_user(&pool, &auth).await?;

    let req = req.into_inner();
    let changes = user_repo::ProfileChanges {
        bio: req.bio,
        gender: req.gender.map(|g| g.as_str().to_string()),
        age: req.age,
        city: req.city,
        avatar_url: req.avatar_url,
        ..Default::default()
    };

    let user = user_repo::update_profile(&pool, auth.id, &changes).await?;
    info!(user_id = auth.id, "profile updated");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Profile updated",
        UserEnvelope {
            user: UserProfile::from_user(user, None),
        },
    )))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = existing_user(&pool, path.into_inner()).await?;
    let stats = user_repo::get_stats(&pool, user.id).await?;
    let is_following = follow_repo::is_following(&pool, auth.id, user.id).await?;

    let mut public = PublicUser::from(user);
    public.stats = Some(stats);
    public.is_following = Some(is_following);

    Ok(HttpResponse::Ok().json(ApiResponse::data(UserEnvelope { user: public })))
}

/// GET /api/v1/users/search/{keyword}
pub async fn search(
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let keyword = path.into_inner();
    let keyword = keyword.trim();
    if keyword.chars().count() < 2 {
        return Err(AppError::Validation(
            "Search keyword must be at least 2 characters".to_string(),
        ));
    }

    let (page, limit, offset) = query.bounds();
    let (users, total) = user_repo::search_users(&pool, keyword, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(user_list(users, total, page, limit))))
}

/// POST /api/v1/users/{id}/follow
pub async fn follow(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let target_id = path.into_inner();
    if target_id == auth.id {
        return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
    }
    existing_user(&pool, target_id).await?;

    if follow_repo::create_follow(&pool, auth.id, target_id).await?.is_none() {
        return Err(AppError::Conflict("Already following this user".to_string()));
    }

    info!(follower_id = auth.id, following_id = target_id, "user followed");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Followed")))
}

/// DELETE /api/v1/users/{id}/follow
pub async fn unfollow(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let target_id = path.into_inner();

    if !follow_repo::delete_follow(&pool, auth.id, target_id).await? {
        return Err(AppError::NotFound("Not following this user".to_string()));
    }

    info!(follower_id = auth.id, following_id = target_id, "user unfollowed");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Unfollowed")))
}

/// GET /api/v1/users/{id}/following
pub async fn following(
    pool: web::Data<AnyPool>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let user = existing_user(&pool, path.into_inner()).await?;
    let (page, limit, offset) = query.bounds();
    let (users, total) = follow_repo::list_following(&pool, user.id, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(user_list(users, total, page, limit))))
}

/// GET /api/v1/users/{id}/followers
pub async fn followers(
    pool: web::Data<AnyPool>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let user = existing_user(&pool, path.into_inner()).await?;
    let (page, limit, offset) = query.bounds();
    let (users, total) = follow_repo::list_followers(&pool, user.id, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(user_list(users, total, page, limit))))
}

/// GET /api/v1/users (admin)
pub async fn list_users(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    auth.require_role(&[Role::Admin])?;

    let (page, limit, offset) = query.bounds();
    let (users, total) = user_repo::list_users(&pool, limit, offset).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(user_list(users, total, page, limit))))
}

/// PATCH /api/v1/users/{id}/status (admin)
pub async fn update_status(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    path: web::Path<i64>,
    req: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse> {
    auth.require_role(&[Role::Admin])?;

    let id = path.into_inner();
    let user = user_repo::set_active(&pool, id, req.is_active)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    info!(admin_id = auth.id, user_id = id, is_active = req.is_active, "account status changed");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        if req.is_active { "User activated" } else { "User deactivated" },
        UserEnvelope {
            user: UserProfile::from_user(user, None),
        },
    )))
}
