use async_trait::async_trait;
use log::info;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    rate_limit::{CategoryLimits, RateLimitDecision},
};

/// Distributed token-bucket store. The only operation is atomic
/// consume-if-available; callers never read bucket state and write it
/// back, so concurrent requests from one client cannot lose updates.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    async fn try_consume(
        &self,
        bucket_key: &str,
        limits: &CategoryLimits,
    ) -> AppResult<RateLimitDecision>;
}

#[derive(Debug, Deserialize, Serialize)]
struct RateLimitBucket {
    #[serde(rename = "_id")]
    id: String,
    tokens: i64,
    window_start: BsonDateTime,
    allowed: bool,
    updated_at: BsonDateTime,
}

pub struct MongoRateLimitRepository {
    collection: Collection<RateLimitBucket>,
}

impl MongoRateLimitRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("rate_limit_buckets");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        // Idle buckets are garbage; let the store evict them after a day.
        let options = IndexOptions::builder()
            .expire_after(Duration::from_secs(24 * 60 * 60))
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "updated_at": 1 })
            .options(options)
            .build();
        self.collection
            .create_index(model)
            .await
            .map_err(store_unavailable)?;
        info!("Created TTL index on rate_limit_buckets.updated_at");

        Ok(())
    }

    /// Single-document aggregation update implementing
    /// `rate_limit::refill_then_consume` server-side. Stage 1 seeds a
    /// fresh bucket at full capacity, stage 2 applies whole elapsed
    /// refill batches, stage 3 consumes one token iff available and
    /// records the decision on the document.
    fn consume_pipeline(limits: &CategoryLimits) -> Vec<Document> {
        let capacity = limits.capacity;
        let refill = limits.refill_tokens;
        let period_ms = limits.refill_period_ms();

        let elapsed_batches = doc! {
            "$floor": {
                "$divide": [
                    { "$max": [ { "$subtract": ["$$NOW", "$window_start"] }, 0 ] },
                    period_ms,
                ]
            }
        };

        vec![
            doc! { "$set": {
                "tokens": { "$ifNull": ["$tokens", capacity] },
                "window_start": { "$ifNull": ["$window_start", "$$NOW"] },
            }},
            doc! { "$set": {
                // $floor yields a double; force the stored counter back
                // to a long so it always deserializes as i64.
                "tokens": {
                    "$toLong": { "$min": [
                        capacity,
                        { "$add": [
                            "$tokens",
                            { "$multiply": [ elapsed_batches.clone(), refill ] },
                        ]},
                    ]}
                },
                "window_start": {
                    "$add": [
                        "$window_start",
                        { "$multiply": [ elapsed_batches, period_ms ] },
                    ]
                },
            }},
            doc! { "$set": {
                "allowed": { "$gte": ["$tokens", 1] },
                "tokens": {
                    "$cond": {
                        "if": { "$gte": ["$tokens", 1] },
                        "then": { "$subtract": ["$tokens", 1] },
                        "else": "$tokens",
                    }
                },
                "updated_at": "$$NOW",
            }},
        ]
    }
}

#[async_trait]
impl RateLimitRepository for MongoRateLimitRepository {
    async fn try_consume(
        &self,
        bucket_key: &str,
        limits: &CategoryLimits,
    ) -> AppResult<RateLimitDecision> {
        let bucket = self
            .collection
            .find_one_and_update(
                doc! { "_id": bucket_key },
                Self::consume_pipeline(limits),
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(store_unavailable)?
            .ok_or_else(|| {
                AppError::InternalError("Bucket upsert returned no document".to_string())
            })?;

        if bucket.allowed {
            Ok(RateLimitDecision::Allowed)
        } else {
            Ok(RateLimitDecision::Limited)
        }
    }
}

/// A store error must never read as an admission decision.
fn store_unavailable(err: mongodb::error::Error) -> AppError {
    AppError::StoreUnavailable(err.to_string())
}
