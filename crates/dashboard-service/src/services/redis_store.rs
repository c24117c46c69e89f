//! Redis-backed item store.
//!
//! # Key Patterns
//!
//! - `item:{id}` - item JSON (camelCase, same shape as the API)
//! - `items:by_created` - ZSET of item ids scored by `created_at` millis
//!
//! Create and delete touch both keys in one `MULTI`/`EXEC` pipeline. Update
//! uses `SET .. XX` so an item deleted concurrently is never resurrected.
//!
//! # Connection Pattern
//!
//! `MultiplexedConnection` is cheap to clone and safe to use concurrently;
//! each operation clones it instead of locking.

use crate::errors::DashboardError;
use crate::models::{Item, ItemFields};
use crate::services::item_store::{apply_update, new_item, newest_first, record_op, ItemStore};
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Instant;
use tracing::{error, instrument, warn};

/// Sorted index of item ids.
const CREATED_INDEX_KEY: &str = "items:by_created";

fn item_key(id: &str) -> String {
    format!("item:{id}")
}

/// Item store persisted in Redis.
#[derive(Clone)]
pub struct RedisItemStore {
    connection: MultiplexedConnection,
}

impl RedisItemStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Store` if the URL is invalid or the
    /// connection fails.
    pub async fn connect(redis_url: &SecretString) -> Result<Self, DashboardError> {
        let client = Client::open(redis_url.expose_secret()).map_err(|e| {
            // Do NOT log the URL, it may embed credentials
            error!(target: "dashboard.items.redis", error = %e, "Failed to open Redis client");
            DashboardError::Store(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "dashboard.items.redis", error = %e, "Failed to connect to Redis");
                DashboardError::Store(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }

    async fn load(&self, id: &str) -> Result<Option<Item>, DashboardError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(item_key(id)).await.map_err(|e| {
            warn!(target: "dashboard.items.redis", error = %e, item_id = %id, "Failed to get item");
            DashboardError::Store(format!("Failed to get item: {e}"))
        })?;

        raw.map(|json| decode_item(&json)).transpose()
    }
}

fn encode_item(item: &Item) -> Result<String, DashboardError> {
    serde_json::to_string(item)
        .map_err(|e| DashboardError::Store(format!("Failed to encode item: {e}")))
}

fn decode_item(json: &str) -> Result<Item, DashboardError> {
    serde_json::from_str(json)
        .map_err(|e| DashboardError::Store(format!("Failed to decode item: {e}")))
}

impl RedisItemStore {
    async fn fetch_all(&self) -> Result<Vec<Item>, DashboardError> {
        let mut conn = self.connection.clone();

        let ids: Vec<String> = conn
            .zrevrange(CREATED_INDEX_KEY, 0, -1)
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to read item index: {e}")))?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| item_key(id)).collect();
        let values: Vec<Option<String>> = conn
            .mget(&keys)
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to read items: {e}")))?;

        let mut items = Vec::with_capacity(values.len());
        for (id, value) in ids.iter().zip(values) {
            match value {
                Some(json) => items.push(decode_item(&json)?),
                None => {
                    warn!(target: "dashboard.items.redis", item_id = %id, "Index entry without item, skipping");
                }
            }
        }
        items.sort_by(newest_first);
        Ok(items)
    }

    async fn insert(&self, fields: ItemFields) -> Result<Item, DashboardError> {
        let item = new_item(fields);
        let json = encode_item(&item)?;
        let mut conn = self.connection.clone();

        let _: () = redis::pipe()
            .atomic()
            .set(item_key(&item.id), json)
            .ignore()
            .zadd(CREATED_INDEX_KEY, &item.id, item.created_at.timestamp_millis())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to create item: {e}")))?;

        tracing::debug!(target: "dashboard.items", item_id = %item.id, "Item created");
        Ok(item)
    }

    async fn replace(&self, id: &str, fields: ItemFields) -> Result<Option<Item>, DashboardError> {
        let Some(existing) = self.load(id).await? else {
            return Ok(None);
        };

        let item = apply_update(existing, fields);
        let json = encode_item(&item)?;
        let mut conn = self.connection.clone();

        let written: Option<String> = redis::cmd("SET")
            .arg(item_key(id))
            .arg(json)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to update item: {e}")))?;

        Ok(written.map(|_| item))
    }

    async fn remove(&self, id: &str) -> Result<(), DashboardError> {
        let mut conn = self.connection.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(item_key(id))
            .ignore()
            .zrem(CREATED_INDEX_KEY, id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| DashboardError::Store(format!("Failed to delete item: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl ItemStore for RedisItemStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip_all, name = "dashboard.items.redis.list")]
    async fn list(&self) -> Result<Vec<Item>, DashboardError> {
        let start = Instant::now();
        let result = self.fetch_all().await;
        record_op(self.backend(), "list", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.redis.create")]
    async fn create(&self, fields: ItemFields) -> Result<Item, DashboardError> {
        let start = Instant::now();
        let result = self.insert(fields).await;
        record_op(self.backend(), "create", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.redis.update", fields(item_id = %id))]
    async fn update(&self, id: &str, fields: ItemFields) -> Result<Option<Item>, DashboardError> {
        let start = Instant::now();
        let result = self.replace(id, fields).await;
        record_op(self.backend(), "update", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.redis.delete", fields(item_id = %id))]
    async fn delete(&self, id: &str) -> Result<(), DashboardError> {
        let start = Instant::now();
        let result = self.remove(id).await;
        record_op(self.backend(), "delete", start, &result);
        result
    }

    async fn ping(&self) -> Result<(), DashboardError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DashboardError::Store(format!("Redis ping failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ItemStatus;

    #[test]
    fn test_item_key_format() {
        assert_eq!(item_key("abc"), "item:abc");
        assert_eq!(CREATED_INDEX_KEY, "items:by_created");
    }

    #[test]
    fn test_item_json_round_trip() {
        let item = new_item(ItemFields {
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            status: ItemStatus::Inactive,
        });

        let json = encode_item(&item).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert_eq!(decode_item(&json).unwrap(), item);
    }

    #[test]
    fn test_decode_item_rejects_garbage() {
        assert!(matches!(
            decode_item("{not json"),
            Err(DashboardError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_invalid_url_is_store_error() {
        let url = SecretString::from("not-a-redis-url");
        assert!(matches!(
            RedisItemStore::connect(&url).await,
            Err(DashboardError::Store(_))
        ));
    }
}
