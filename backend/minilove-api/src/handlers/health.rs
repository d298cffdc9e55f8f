use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use sqlx::AnyPool;

use crate::db::{self, Backend};

pub const SERVICE_NAME: &str = "minilove-api";

#[derive(Serialize)]
struct DatabaseHealth {
    backend: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    version: &'static str,
    database: DatabaseHealth,
}

/// Liveness plus a quick database round trip
pub async fn health_check(pool: web::Data<AnyPool>, backend: web::Data<Backend>) -> impl Responder {
    let db_status = match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "health check database ping failed");
            "unhealthy"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: if db_status == "healthy" { "ok" } else { "degraded" },
        timestamp: db::now(),
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            backend: backend.as_str(),
            status: db_status,
        },
    })
}
