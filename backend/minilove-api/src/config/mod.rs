use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Fallback signing secret for local development only.
const DEV_JWT_SECRET: &str = "minilove-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub env: String,

    #[serde(default = "default_app_host")]
    pub host: String,

    #[serde(default = "default_app_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. `None` selects SQLite.
    pub url: Option<String>,

    #[serde(default)]
    pub use_sqlite: bool,

    #[serde(default = "default_db_path")]
    pub sqlite_path: String,

    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_jwt_ttl")]
    pub expires_in_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins, or "*"
    pub allowed_origins: String,

    #[serde(default = "default_cors_max_age")]
    pub max_age: usize,
}

// Default value functions
fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/minilove_dev.db".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_run_migrations() -> bool {
    true
}

fn default_jwt_ttl() -> i64 {
    7 * 24 * 3600 // 7 days
}

fn default_cors_max_age() -> usize {
    3600 // 1 hour
}

fn default_cors_origins() -> String {
    "http://localhost:5173".to_string()
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s` or `3600`.
pub fn parse_duration_secs(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };

    let value: i64 = digits.parse().ok()?;
    if value <= 0 {
        return None;
    }

    let multiplier = match unit {
        None | Some('s') => 1,
        Some('m') => 60,
        Some('h') => 3600,
        Some('d') => 86_400,
        Some(_) => return None,
    };

    Some(value * multiplier)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| default_app_env()),
            host: env::var("APP_HOST").unwrap_or_else(|_| default_app_host()),
            port: env_parse("APP_PORT", default_app_port())?,
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            use_sqlite: env_flag("USE_SQLITE"),
            sqlite_path: env::var("DB_PATH").unwrap_or_else(|_| default_db_path()),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", default_db_max_connections())?,
            run_migrations: env::var("RUN_MIGRATIONS")
                .map(|v| v != "false")
                .unwrap_or_else(|_| default_run_migrations()),
        };

        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if app.env == "production" => return Err(ConfigError::Missing("JWT_SECRET")),
            _ => {
                tracing::warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let expires_in_secs = match env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration_secs(&raw).ok_or(ConfigError::Invalid {
                name: "JWT_EXPIRES_IN",
                value: raw,
            })?,
            Err(_) => default_jwt_ttl(),
        };

        let jwt = JwtConfig {
            secret,
            expires_in_secs,
        };

        let cors = CorsConfig {
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| default_cors_origins()),
            max_age: env_parse("CORS_MAX_AGE", default_cors_max_age())?,
        };

        Ok(Config {
            app,
            database,
            jwt,
            cors,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_secs("7d"), Some(604_800));
        assert_eq!(parse_duration_secs("12h"), Some(43_200));
        assert_eq!(parse_duration_secs("30m"), Some(1_800));
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("3600"), Some(3_600));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration_secs(""), None);
        assert_eq!(parse_duration_secs("abc"), None);
        assert_eq!(parse_duration_secs("7w"), None);
        assert_eq!(parse_duration_secs("0d"), None);
        assert_eq!(parse_duration_secs("-5"), None);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_to_sqlite_without_database_url() {
        env::remove_var("DATABASE_URL");
        env::remove_var("USE_SQLITE");
        env::remove_var("JWT_EXPIRES_IN");
        env::set_var("APP_ENV", "test");

        let config = Config::from_env().unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.jwt.expires_in_secs, 604_800);
        assert!(!config.is_production());

        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    fn test_from_env_requires_secret_in_production() {
        env::set_var("APP_ENV", "production");
        env::remove_var("JWT_SECRET");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("JWT_SECRET"))));

        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_port() {
        env::set_var("APP_PORT", "not-a-port");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid { name: "APP_PORT", .. })));

        env::remove_var("APP_PORT");
    }
}
