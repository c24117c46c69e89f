//! Item persistence.
//!
//! `ItemStore` is the seam between the item handlers and a backend. Two
//! backends exist: [`MemoryItemStore`] (default, process-local) and
//! [`RedisItemStore`](crate::services::redis_store::RedisItemStore).
//!
//! Every backend returns items newest-first by `created_at` (ties broken by
//! id) and preserves `created_at` across updates.

use crate::errors::DashboardError;
use crate::models::{Item, ItemFields};
use crate::observability::metrics;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

/// Trait for item persistence (enables swapping backends and mocking).
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Short backend name used as a metrics label.
    fn backend(&self) -> &'static str;

    /// All items, newest first.
    async fn list(&self) -> Result<Vec<Item>, DashboardError>;

    /// Create an item with a fresh id and timestamps.
    async fn create(&self, fields: ItemFields) -> Result<Item, DashboardError>;

    /// Replace the mutable fields of an existing item.
    ///
    /// Returns `Ok(None)` if no item has this id.
    async fn update(&self, id: &str, fields: ItemFields) -> Result<Option<Item>, DashboardError>;

    /// Delete an item. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), DashboardError>;

    /// Cheap liveness check for the readiness probe.
    async fn ping(&self) -> Result<(), DashboardError>;
}

/// Build a new item from validated fields.
pub(crate) fn new_item(fields: ItemFields) -> Item {
    let now = Utc::now();
    Item {
        id: Uuid::new_v4().to_string(),
        name: fields.name,
        description: fields.description,
        status: fields.status,
        created_at: now,
        updated_at: now,
    }
}

/// Apply validated fields to an existing item, keeping `id` and `created_at`.
pub(crate) fn apply_update(existing: Item, fields: ItemFields) -> Item {
    Item {
        name: fields.name,
        description: fields.description,
        status: fields.status,
        updated_at: Utc::now(),
        ..existing
    }
}

/// Newest-first ordering shared by all backends.
pub(crate) fn newest_first(a: &Item, b: &Item) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Record the outcome of a store operation.
pub(crate) fn record_op<T>(
    backend: &str,
    operation: &str,
    start: Instant,
    result: &Result<T, DashboardError>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_item_store_op(backend, operation, status, start.elapsed());
}

/// Process-local item store.
///
/// Contents are lost on restart. Suitable for development and tests.
#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip_all, name = "dashboard.items.memory.list")]
    async fn list(&self) -> Result<Vec<Item>, DashboardError> {
        let start = Instant::now();
        let mut items: Vec<Item> = self.items.read().await.values().cloned().collect();
        items.sort_by(newest_first);

        let result = Ok(items);
        record_op(self.backend(), "list", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.memory.create")]
    async fn create(&self, fields: ItemFields) -> Result<Item, DashboardError> {
        let start = Instant::now();
        let item = new_item(fields);
        self.items
            .write()
            .await
            .insert(item.id.clone(), item.clone());

        tracing::debug!(target: "dashboard.items", item_id = %item.id, "Item created");
        let result = Ok(item);
        record_op(self.backend(), "create", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.memory.update", fields(item_id = %id))]
    async fn update(&self, id: &str, fields: ItemFields) -> Result<Option<Item>, DashboardError> {
        let start = Instant::now();
        let mut items = self.items.write().await;

        let updated = match items.remove(id) {
            Some(existing) => {
                let item = apply_update(existing, fields);
                items.insert(item.id.clone(), item.clone());
                Some(item)
            }
            None => None,
        };
        drop(items);

        let result = Ok(updated);
        record_op(self.backend(), "update", start, &result);
        result
    }

    #[instrument(skip_all, name = "dashboard.items.memory.delete", fields(item_id = %id))]
    async fn delete(&self, id: &str) -> Result<(), DashboardError> {
        let start = Instant::now();
        let removed = self.items.write().await.remove(id).is_some();
        tracing::debug!(target: "dashboard.items", item_id = %id, removed, "Item delete");

        let result = Ok(());
        record_op(self.backend(), "delete", start, &result);
        result
    }

    async fn ping(&self) -> Result<(), DashboardError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ItemStatus;

    fn fields(name: &str) -> ItemFields {
        ItemFields {
            name: name.to_string(),
            description: format!("{name} description"),
            status: ItemStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryItemStore::new();
        let item = store.create(fields("first")).await.unwrap();

        assert!(Uuid::parse_str(&item.id).is_ok());
        assert_eq!(item.created_at, item.updated_at);
        assert_eq!(item.status, ItemStatus::Active);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryItemStore::new();
        let a = store.create(fields("a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let b = store.create(fields("b")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let c = store.create(fields("c")).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let store = MemoryItemStore::new();
        let item = store.create(fields("orig")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let updated = store
            .update(
                &item.id,
                ItemFields {
                    name: "renamed".to_string(),
                    description: "changed".to_string(),
                    status: ItemStatus::Pending,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, item.created_at);
        assert!(updated.updated_at > item.updated_at);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_none() {
        let store = MemoryItemStore::new();
        assert!(store.update("missing", fields("x")).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryItemStore::new();
        let item = store.create(fields("gone")).await.unwrap();

        store.delete(&item.id).await.unwrap();
        store.delete(&item.id).await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let now = Utc::now();
        let mk = |id: &str| Item {
            id: id.to_string(),
            name: "n".to_string(),
            description: "d".to_string(),
            status: ItemStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let mut items = vec![mk("b"), mk("a")];
        items.sort_by(newest_first);
        assert_eq!(items.first().unwrap().id, "a");
    }
}
