pub mod auth;
pub mod catalog;
pub mod comments;
pub mod health;
pub mod posts;
pub mod users;

use actix_web::{web, HttpRequest};
use serde::Deserialize;

use crate::db;
use crate::error::AppError;
use crate::middleware::JwtAuthMiddleware;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// `?page=&limit=` pagination parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// `(page, limit, offset)` with the default page size
    pub fn bounds(&self) -> (i64, i64, i64) {
        db::page_bounds(self.page, self.limit, DEFAULT_PAGE_SIZE)
    }
}

async fn route_not_found(req: HttpRequest) -> Result<actix_web::HttpResponse, AppError> {
    Err(AppError::NotFound(format!("Route {} {} not found", req.method(), req.path())))
}

/// Register every route plus the extractor error handlers.
///
/// Public post reads run behind optional authentication; everything that acts
/// on behalf of a user requires a valid bearer token.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health_check))
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/topics", web::get().to(catalog::list_topics))
            .route("/membership/plans", web::get().to(catalog::list_plans))
            .service(auth_routes())
            .service(user_routes())
            .service(post_routes())
            .service(comment_routes()),
    )
    .default_service(web::route().to(route_not_found));
}

fn auth_routes() -> actix_web::Scope {
    web::scope("/auth")
        .route("/register", web::post().to(auth::register))
        .route("/login", web::post().to(auth::login))
        .service(
            web::resource("/profile")
                .wrap(JwtAuthMiddleware::required())
                .route(web::get().to(auth::get_profile))
                .route(web::put().to(auth::update_profile)),
        )
        .service(
            web::resource("/password")
                .wrap(JwtAuthMiddleware::required())
                .route(web::put().to(auth::change_password)),
        )
        .service(
            web::resource("/refresh")
                .wrap(JwtAuthMiddleware::required())
                .route(web::post().to(auth::refresh_token)),
        )
        .service(
            web::resource("/verify")
                .wrap(JwtAuthMiddleware::required())
                .route(web::get().to(auth::verify)),
        )
        .service(
            web::resource("/logout")
                .wrap(JwtAuthMiddleware::required())
                .route(web::post().to(auth::logout)),
        )
}

fn user_routes() -> actix_web::Scope<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    web::scope("/users")
        .wrap(JwtAuthMiddleware::required())
        .route("", web::get().to(users::list_users))
        .route("/me", web::get().to(users::me))
        .route("/profile", web::put().to(users::update_profile))
        .route("/search/{keyword}", web::get().to(users::search))
        .route("/{id}", web::get().to(users::get_user))
        .route("/{id}/follow", web::post().to(users::follow))
        .route("/{id}/follow", web::delete().to(users::unfollow))
        .route("/{id}/following", web::get().to(users::following))
        .route("/{id}/followers", web::get().to(users::followers))
        .route("/{id}/status", web::patch().to(users::update_status))
}

/// Static segments are registered ahead of `/{id}` so they are not shadowed.
fn post_routes() -> actix_web::Scope<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    web::scope("/posts")
        .wrap(JwtAuthMiddleware::optional())
        .route("", web::get().to(posts::list_posts))
        .route("", web::post().to(posts::create_post))
        .route("/featured", web::get().to(posts::featured))
        .route("/trending", web::get().to(posts::trending_posts))
        .route("/bookmarks", web::get().to(posts::list_bookmarks))
        .route("/premium/feed", web::get().to(posts::premium_feed))
        .route("/premium/topics", web::get().to(posts::premium_topics))
        .route("/user/{user_id}", web::get().to(posts::list_user_posts))
        .route("/{id}", web::get().to(posts::get_post))
        .route("/{id}", web::put().to(posts::update_post))
        .route("/{id}", web::delete().to(posts::delete_post))
        .route("/{id}/comments", web::get().to(posts::list_comments))
        .route("/{id}/like", web::post().to(posts::like_post))
        .route("/{id}/like", web::delete().to(posts::unlike_post))
        .route("/{id}/bookmark", web::post().to(posts::bookmark_post))
        .route("/{id}/bookmark", web::delete().to(posts::unbookmark_post))
}

fn comment_routes() -> actix_web::Scope<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    web::scope("/comments")
        .wrap(JwtAuthMiddleware::required())
        .route("", web::post().to(comments::create_comment))
        .route("/{id}", web::put().to(comments::update_comment))
        .route("/{id}", web::delete().to(comments::delete_comment))
        .route("/{id}/like", web::post().to(comments::like_comment))
        .route("/{id}/like", web::delete().to(comments::unlike_comment))
}
