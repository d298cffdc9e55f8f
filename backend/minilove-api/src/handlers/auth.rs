/// Registration, sign-in and account self-service endpoints
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::AnyPool;
use tracing::{info, warn};
use validator::Validate;

use crate::db::user_repo::{self, NewUser, ProfileChanges};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{ApiResponse, AuthPayload, Gender, User, UserEnvelope, UserProfile, UserSummary};
use crate::security::{generate_token, hash_password, verify_password};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "crate::validators::validate_username"))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 100))]
    pub password: String,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    pub gender: Option<Gender>,

    #[validate(range(min = 18, max = 100))]
    pub age: Option<i64>,

    #[validate(length(max = 100))]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "crate::validators::validate_username"))]
    pub username: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    #[validate(length(max = 500))]
    pub avatar_url: Option<String>,

    #[validate(length(max = 500))]
    pub bio: Option<String>,

    pub gender: Option<Gender>,

    #[validate(range(min = 18, max = 100))]
    pub age: Option<i64>,

    #[validate(length(max = 100))]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,

    #[validate(length(min = 6, max = 100))]
    pub new_password: String,
}

/// Reject identity fields already used by another account.
async fn ensure_identity_available(
    pool: &AnyPool,
    username: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
    exclude_id: Option<i64>,
) -> Result<()> {
    if let Some(username) = username {
        if user_repo::username_exists(pool, username, exclude_id).await? {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
    }
    if let Some(email) = email {
        if user_repo::email_exists(pool, email, exclude_id).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
    }
    if let Some(phone) = phone.filter(|p| !p.is_empty()) {
        if user_repo::phone_exists(pool, phone, exclude_id).await? {
            return Err(AppError::Conflict("Phone number already registered".to_string()));
        }
    }
    Ok(())
}

/// Load the caller's row, treating a vanished account as an auth failure
pub(crate) async fn current_user(pool: &AnyPool, auth: &AuthUser) -> Result<User> {
    user_repo::find_by_id(pool, auth.id)
        .await?
        .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))
}

/// POST /api/v1/auth/register
pub async fn register(
    pool: web::Data<AnyPool>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    ensure_identity_available(
        &pool,
        Some(&req.username),
        Some(&req.email),
        req.phone.as_deref(),
        None,
    )
    .await?;

    let password_hash = hash_password(&req.password)?;
    let gender = req.gender.unwrap_or(Gender::Unknown);

    let user = user_repo::create_user(
        &pool,
        &NewUser {
            username: &req.username,
            email: &req.email,
            password_hash: &password_hash,
            phone: req.phone.as_deref().filter(|p| !p.is_empty()),
            gender: gender.as_str(),
            age: req.age,
            city: req.city.as_deref(),
        },
    )
    .await?;

    let token = generate_token(user.id, user.token_role())?;
    info!(user_id = user.id, username = %user.username, "user registered");

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Registration successful",
        AuthPayload {
            user: UserSummary::registered(&user),
            token,
        },
    )))
}

/// POST /api/v1/auth/login
pub async fn login(pool: web::Data<AnyPool>, req: web::Json<LoginRequest>) -> Result<HttpResponse> {
    req.validate()?;

    let invalid = || AppError::Authentication("Invalid username or password".to_string());

    let user = match user_repo::find_by_username_or_email(&pool, &req.username).await? {
        Some(user) => user,
        None => {
            warn!(identifier = %req.username, "login for unknown account");
            return Err(invalid());
        }
    };

    if !user.is_active {
        warn!(user_id = user.id, "login for disabled account");
        return Err(AppError::Authentication("Account is disabled".to_string()));
    }

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(invalid());
    }

    let token = generate_token(user.id, user.token_role())?;
    info!(user_id = user.id, "user signed in");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Login successful",
        AuthPayload {
            user: UserSummary::signed_in(&user),
            token,
        },
    )))
}

/// GET /api/v1/auth/profile
pub async fn get_profile(pool: web::Data<AnyPool>, auth: AuthUser) -> Result<HttpResponse> {
    let user = current_user(&pool, &auth).await?;
    let stats = user_repo::get_stats(&pool, user.id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(UserEnvelope {
        user: UserProfile::from_user(user, Some(stats)),
    })))
}

/// PUT /api/v1/auth/profile
pub async fn update_profile(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    req: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    current_user(&pool, &auth).await?;

    ensure_identity_available(
        &pool,
        req.username.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
        Some(auth.id),
    )
    .await?;

    let req = req.into_inner();
    let changes = ProfileChanges {
        username: req.username,
        email: req.email,
        phone: req.phone.filter(|p| !p.is_empty()),
        avatar_url: req.avatar_url,
        bio: req.bio,
        gender: req.gender.map(|g| g.as_str().to_string()),
        age: req.age,
        city: req.city,
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

/// PUT /api/v1/auth/password
pub async fn change_password(
    pool: web::Data<AnyPool>,
    auth: AuthUser,
    req: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let user = current_user(&pool, &auth).await?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        warn!(user_id = user.id, "password change with wrong current password");
        return Err(AppError::Authentication(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    user_repo::update_password(&pool, user.id, &password_hash).await?;
    info!(user_id = user.id, "password changed");

    Ok(HttpResponse::Ok().json(ApiResponse::message("Password updated")))
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(pool: web::Data<AnyPool>, auth: AuthUser) -> Result<HttpResponse> {
    let user = current_user(&pool, &auth).await?;
    if !user.is_active {
        return Err(AppError::Authentication("Account is disabled".to_string()));
    }

    // Role is re-derived so membership changes take effect on refresh
    let token = generate_token(user.id, user.token_role())?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Token refreshed",
        serde_json::json!({ "token": token }),
    )))
}

/// GET /api/v1/auth/verify
pub async fn verify(pool: web::Data<AnyPool>, auth: AuthUser) -> Result<HttpResponse> {
    let user = current_user(&pool, &auth).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Token is valid",
        UserEnvelope {
            user: UserSummary::signed_in(&user),
        },
    )))
}

/// POST /api/v1/auth/logout
///
/// Tokens are stateless, so the client discards its copy and the server only
/// records the event.
pub async fn logout(auth: AuthUser) -> Result<HttpResponse> {
    info!(user_id = auth.id, "user signed out");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Logged out")))
}
