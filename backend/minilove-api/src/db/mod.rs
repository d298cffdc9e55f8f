//! Persistence adapter and repositories.
//!
//! A single `AnyPool` fronts either PostgreSQL or SQLite. All repository SQL is
//! written in the dialect both engines accept (`$N` placeholders, `RETURNING`,
//! `ON CONFLICT DO NOTHING`, `CASE WHEN` for floored decrements).

use chrono::{SecondsFormat, Utc};
use futures::future::BoxFuture;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool};
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;

pub mod bookmark_repo;
pub mod comment_repo;
pub mod follow_repo;
pub mod like_repo;
pub mod membership_repo;
pub mod post_repo;
pub mod topic_repo;
pub mod user_repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: AnyPool,
    pub backend: Backend,
}

/// Current time in the textual form stored in every timestamp column.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite connection URL for a database file, creating missing parent directories.
pub fn sqlite_url(path: &str) -> std::io::Result<String> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(format!("sqlite://{}?mode=rwc", path))
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<AnyPool, sqlx::Error> {
    sqlx::any::install_default_drivers();

    AnyPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

async fn connect_sqlite(config: &DatabaseConfig) -> Result<Database, sqlx::Error> {
    let url = sqlite_url(&config.sqlite_path)?;
    let pool = create_pool(&url, config.max_connections).await?;
    tracing::info!(path = %config.sqlite_path, "using SQLite database");
    Ok(Database {
        pool,
        backend: Backend::Sqlite,
    })
}

/// Select and open the configured backend.
///
/// SQLite is used when explicitly requested or when no PostgreSQL URL is
/// configured. A PostgreSQL connection failure falls back to SQLite.
pub async fn connect(config: &DatabaseConfig) -> Result<Database, sqlx::Error> {
    let url = match (&config.url, config.use_sqlite) {
        (Some(url), false) => url,
        _ => return connect_sqlite(config).await,
    };

    match create_pool(url, config.max_connections).await {
        Ok(pool) => {
            tracing::info!(
                "PostgreSQL pool created with {} max connections",
                config.max_connections
            );
            Ok(Database {
                pool,
                backend: Backend::Postgres,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "PostgreSQL unavailable, falling back to SQLite");
            connect_sqlite(config).await
        }
    }
}

pub async fn run_migrations(db: &Database) -> Result<(), sqlx::migrate::MigrateError> {
    match db.backend {
        Backend::Postgres => sqlx::migrate!("./migrations/postgres").run(&db.pool).await,
        Backend::Sqlite => sqlx::migrate!("./migrations/sqlite").run(&db.pool).await,
    }
}

/// Run `f` inside BEGIN/COMMIT. Any error rolls the transaction back and is
/// returned unchanged.
pub async fn transaction<T, E, F>(pool: &AnyPool, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(e)
        }
    }
}

/// Clamp pagination input to `page >= 1` and `1 <= limit <= 100`.
pub fn page_bounds(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh migrated SQLite database in a temp directory.
    pub async fn sqlite_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let config = DatabaseConfig {
            url: None,
            use_sqlite: true,
            sqlite_path: path.to_string_lossy().into_owned(),
            max_connections: 5,
            run_migrations: true,
        };
        let db = connect(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        (db, dir)
    }
}
