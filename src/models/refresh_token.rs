//! Refresh token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted refresh token record.
///
/// Only the SHA-256 digest of the opaque token is stored; the token itself is
/// handed to the client once and never written anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: i64, token_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            token_hash,
            expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_refresh_token_state() {
        let mut token = RefreshToken::new(1, "hash".to_string(), Utc::now() + Duration::days(7));
        assert!(!token.is_revoked());
        assert!(!token.is_expired());

        token.revoked_at = Some(Utc::now());
        assert!(token.is_revoked());

        let expired = RefreshToken::new(1, "hash".to_string(), Utc::now() - Duration::seconds(1));
        assert!(expired.is_expired());
    }
}
