//! Access and refresh tokens
//!
//! Access tokens are HS256 JWTs carrying `sub`, `email`, `role`, `iat` and
//! `exp`. Refresh tokens are 32 random bytes, base64url encoded, persisted
//! only as their SHA-256 digest.

use anyhow::{Context, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::models::{User, UserRole};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id, as a decimal string
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// A freshly minted access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// A freshly minted refresh token; `token` is the value handed to the client
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an access token for the user
    pub fn issue_access_token(&self, user: &User) -> Result<AccessToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign access token")?;

        Ok(AccessToken {
            token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Validate signature and expiry. Any failure yields `None`.
    pub fn decode_access_token(&self, token: &str) -> Option<Claims> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected access token: {}", e);
                None
            }
        }
    }

    /// Generate a new opaque refresh token
    pub fn issue_refresh_token(&self) -> IssuedRefreshToken {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = data_encoding::BASE64URL_NOPAD.encode(&bytes);

        IssuedRefreshToken {
            token_hash: super::otp::sha256_hex(&token),
            token,
            expires_at: Utc::now() + self.refresh_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ttl_minutes: i64) -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: "unit-test-secret-value".to_string(),
            access_token_ttl_minutes: ttl_minutes,
            ..AuthConfig::default()
        })
    }

    fn user() -> User {
        let mut user = User::new(
            "Jane".to_string(),
            "jane@example.com".to_string(),
            "hash".to_string(),
            UserRole::Editor,
        );
        user.id = 42;
        user
    }

    #[test]
    fn test_access_token_roundtrip() {
        let tokens = service(15);
        let issued = tokens.issue_access_token(&user()).unwrap();
        assert_eq!(issued.expires_in, 15 * 60);

        let claims = tokens.decode_access_token(&issued.token).expect("token should verify");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.role, UserRole::Editor);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service(-1);
        let issued = tokens.issue_access_token(&user()).unwrap();
        assert!(tokens.decode_access_token(&issued.token).is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = service(15).issue_access_token(&user()).unwrap();
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "a-different-secret-value".to_string(),
            ..AuthConfig::default()
        });
        assert!(other.decode_access_token(&issued.token).is_none());
        assert!(other.decode_access_token("not.a.jwt").is_none());
    }

    #[test]
    fn test_refresh_token_shape() {
        let tokens = service(15);
        let a = tokens.issue_refresh_token();
        let b = tokens.issue_refresh_token();

        assert_ne!(a.token, b.token);
        // 32 bytes -> 43 base64url characters without padding
        assert_eq!(a.token.len(), 43);
        assert!(a
            .token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(a.token_hash, super::super::otp::sha256_hex(&a.token));
        assert!(a.expires_at > Utc::now() + Duration::days(6));
    }
}
