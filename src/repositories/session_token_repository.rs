use async_trait::async_trait;
use log::info;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};
use std::time::Duration;

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::SessionToken,
};

/// Store of rotating session tokens, one live record per account.
///
/// Every mutation is a single atomic store operation; the application
/// tier never does read-check-write against this collection. Driver
/// failures surface as `StoreUnavailable`, which is distinct from an
/// absent record: absence rejects a credential, unavailability is a
/// transient fault the caller may retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionTokenRepository: Send + Sync {
    /// Create the record for this account, atomically superseding any
    /// previous session for the same email (rotation).
    async fn save(&self, token: SessionToken) -> AppResult<SessionToken>;

    /// Lookup without consuming. Treats a logically-expired record as
    /// absent and deletes it as a cleanup side effect.
    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>>;

    /// Atomic lookup-and-delete. Of N concurrent callers presenting the
    /// same token, exactly one receives the record.
    async fn consume_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<SessionToken>>;

    /// Idempotent; deleting an absent token is not an error.
    async fn delete_by_token_hash(&self, hash: &str) -> AppResult<()>;

    async fn ensure_indexes(&self) -> AppResult<()>;
}

pub struct MongoSessionTokenRepository {
    collection: Collection<SessionToken>,
}

impl MongoSessionTokenRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("session_tokens");
        Self { collection }
    }
}

#[async_trait]
impl SessionTokenRepository for MongoSessionTokenRepository {
    async fn save(&self, token: SessionToken) -> AppResult<SessionToken> {
        // Replace-by-email with upsert: the unique email index keys the
        // record on the identity, so the old token vanishes in the same
        // operation that writes the new one. Safe under concurrent
        // refreshes for one account.
        self.collection
            .find_one_and_replace(doc! { "email": &token.email }, &token)
            .upsert(true)
            .await
            .map_err(store_unavailable)?;

        Ok(token)
    }

    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>> {
        let record = self
            .collection
            .find_one(doc! { "token_hash": hash })
            .await
            .map_err(store_unavailable)?;

        match record {
            Some(token) if token.is_expired() => {
                // TTL eviction lags the wall clock; finish the job here.
                self.collection
                    .delete_one(doc! { "token_hash": hash })
                    .await
                    .map_err(store_unavailable)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn consume_by_token_hash(&self, hash: &str) -> AppResult<Option<SessionToken>> {
        let record = self
            .collection
            .find_one_and_delete(doc! { "token_hash": hash })
            .await
            .map_err(store_unavailable)?;

        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<SessionToken>> {
        let record = self
            .collection
            .find_one(doc! { "email": email })
            .await
            .map_err(store_unavailable)?;

        match record {
            Some(token) if token.is_expired() => {
                self.collection
                    .delete_one(doc! { "token_hash": &token.token_hash })
                    .await
                    .map_err(store_unavailable)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete_by_token_hash(&self, hash: &str) -> AppResult<()> {
        self.collection
            .delete_one(doc! { "token_hash": hash })
            .await
            .map_err(store_unavailable)?;

        Ok(())
    }

    async fn ensure_indexes(&self) -> AppResult<()> {
        let token_hash_options = IndexOptions::builder().unique(true).build();
        let token_hash_model = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(token_hash_options)
            .build();
        self.collection
            .create_index(token_hash_model)
            .await
            .map_err(store_unavailable)?;
        info!("Created unique index on session_tokens.token_hash");

        // One live session per account.
        let email_options = IndexOptions::builder().unique(true).build();
        let email_model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(email_options)
            .build();
        self.collection
            .create_index(email_model)
            .await
            .map_err(store_unavailable)?;
        info!("Created unique index on session_tokens.email");

        // Passive store-side expiry.
        let ttl_options = IndexOptions::builder()
            .expire_after(Duration::from_secs(0))
            .build();
        let ttl_model = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(ttl_options)
            .build();
        self.collection
            .create_index(ttl_model)
            .await
            .map_err(store_unavailable)?;
        info!("Created TTL index on session_tokens.expires_at");

        Ok(())
    }
}

fn store_unavailable(err: mongodb::error::Error) -> AppError {
    AppError::StoreUnavailable(err.to_string())
}
