pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, Result};

use actix_cors::Cors;
use actix_web::web;

use crate::config::CorsConfig;

/// Shared state plus every route, ready for `App::configure`.
///
/// The pool and the backend tag are registered as separate `web::Data`
/// entries so handlers only extract what they use.
pub fn configure_app(db: Database) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(db.pool))
            .app_data(web::Data::new(db.backend));
        handlers::configure(cfg);
    }
}

/// CORS policy built from `CORS_ALLOWED_ORIGINS` (`*` allows any origin)
pub fn build_cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default();

    for origin in config.allowed_origins.split(',') {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }

    cors.allow_any_method()
        .allow_any_header()
        .max_age(config.max_age)
}
