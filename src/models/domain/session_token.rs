use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::user::UserRole;

/// One rotating session token per account. The raw token is handed to the
/// client exactly once; only its SHA-256 digest is stored. The `email`
/// field is unique in the store, which is what enforces the
/// one-live-session-per-account rotation invariant.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token_hash: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub roles: Vec<UserRole>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(
        token_hash: String,
        user_id: String,
        email: String,
        username: String,
        roles: Vec<UserRole>,
        ttl_hours: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            token_hash,
            user_id,
            email,
            username,
            roles,
            created_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        }
    }

    /// TTL eviction in the store is not synchronous with the wall clock,
    /// so callers must treat a record past its expiry as already dead.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Opaque random session token, UUID v4 without dashes.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_token(ttl_hours: i64) -> SessionToken {
        SessionToken::new(
            hash_token("raw-token"),
            "user123".to_string(),
            "john@example.com".to_string(),
            "johndoe".to_string(),
            vec![UserRole::User],
            ttl_hours,
        )
    }

    #[test]
    fn test_session_token_creation() {
        let token = test_token(168);

        assert_eq!(token.user_id, "user123");
        assert_eq!(token.email, "john@example.com");
        assert!(!token.is_expired());
        assert!(token.expires_at > token.created_at);
    }

    #[test]
    fn test_session_token_expired() {
        let token = test_token(-1);
        assert!(token.is_expired());
    }

    #[test]
    fn test_generate_token_is_opaque_and_unique() {
        let a = generate_token();
        let b = generate_token();

        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_consistency() {
        let hash1 = hash_token("my-secret-token");
        let hash2 = hash_token("my-secret-token");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_hash_token_different_inputs() {
        assert_ne!(hash_token("token1"), hash_token("token2"));
    }
}
