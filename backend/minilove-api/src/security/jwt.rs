/// JWT token generation and validation using HS256 with a shared secret.
/// Tokens carry the user id as `sub` and a coarse role.
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::Role;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Coarse role: user, premium or admin
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Authentication("Invalid user ID in token".to_string()))
    }
}

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

// Process-wide signing keys, set once during startup
static JWT_KEYS: Lazy<RwLock<Option<JwtKeys>>> = Lazy::new(|| RwLock::new(None));

/// Install the shared secret and token lifetime.
/// Must be called during application startup before any JWT operations.
pub fn initialize_keys(secret: &str, ttl_secs: i64) -> Result<()> {
    if secret.is_empty() {
        return Err(AppError::Internal("JWT secret must not be empty".to_string()));
    }

    let mut keys = JWT_KEYS
        .write()
        .map_err(|e| AppError::Internal(format!("Failed to acquire write lock on JWT keys: {}", e)))?;
    *keys = Some(JwtKeys {
        encoding: EncodingKey::from_secret(secret.as_bytes()),
        decoding: DecodingKey::from_secret(secret.as_bytes()),
        ttl_secs,
    });

    Ok(())
}

fn with_keys<T>(f: impl FnOnce(&JwtKeys) -> Result<T>) -> Result<T> {
    let keys = JWT_KEYS
        .read()
        .map_err(|e| AppError::Internal(format!("Failed to acquire read lock on JWT keys: {}", e)))?;

    match keys.as_ref() {
        Some(keys) => f(keys),
        None => Err(AppError::Internal(
            "JWT keys not initialized. Call initialize_keys() during startup".to_string(),
        )),
    }
}

/// Generate a signed access token for a user
pub fn generate_token(user_id: i64, role: Role) -> Result<String> {
    with_keys(|keys| {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(keys.ttl_secs)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(AppError::from)
    })
}

/// Validate and decode a token
pub fn validate_token(token: &str) -> Result<TokenData<Claims>> {
    with_keys(|keys| {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &keys.decoding, &validation).map_err(AppError::from)
    })
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "minilove-test-secret";

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        initialize_keys(TEST_SECRET, 3600).unwrap();
    }

    #[test]
    fn test_generate_and_validate_token() {
        init();
        let token = generate_token(42, Role::Premium).unwrap();
        // JWT tokens have 3 parts separated by dots
        assert_eq!(token.matches('.').count(), 2);

        let data = validate_token(&token).unwrap();
        assert_eq!(data.claims.sub, "42");
        assert_eq!(data.claims.role, Role::Premium);
        assert_eq!(data.claims.user_id().unwrap(), 42);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        init();
        let token = generate_token(7, Role::User).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');

        let err = validate_token(&tampered).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TOKEN");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        init();
        let claims = Claims {
            sub: "1".to_string(),
            role: Role::Admin,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();

        assert!(validate_token(&forged).is_err());
    }

    #[test]
    fn test_expired_token_reports_expiry() {
        init();
        let claims = Claims {
            sub: "1".to_string(),
            role: Role::User,
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let err = validate_token(&expired).unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_EXPIRED");
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "not-a-number".to_string(),
            role: Role::User,
            iat: 0,
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(initialize_keys("", 60).is_err());
    }
}
