//! MemoryItemStore - In-Process Item Store
//!
//! TigerStyle: deterministic, with injectable latency and outages so the
//! document registrar's timeout and failure paths can be tested.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{item_id, Item, ItemStore, ItemStoreError, ItemStoreResult};

/// Item store held in memory. Tables spring into existence on first write.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Item>>>,
    latency: Option<Duration>,
    offline: AtomicBool,
}

impl MemoryItemStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent call fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of items in `table`.
    pub async fn item_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, BTreeMap::len)
    }

    async fn enter(&self) -> ItemStoreResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ItemStoreError::unavailable("store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn put_item(&self, table: &str, item: Item) -> ItemStoreResult<()> {
        self.enter().await?;
        let id = item_id(&item)
            .ok_or_else(|| ItemStoreError::rejected("item has no string id"))?
            .to_string();

        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(id, item);
        Ok(())
    }

    async fn get_item(&self, table: &str, id: &str) -> ItemStoreResult<Option<Item>> {
        self.enter().await?;
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|items| items.get(id)).cloned())
    }

    async fn delete_item(&self, table: &str, id: &str) -> ItemStoreResult<()> {
        self.enter().await?;
        if let Some(items) = self.tables.write().await.get_mut(table) {
            items.remove(id);
        }
        Ok(())
    }

    async fn scan(&self, table: &str) -> ItemStoreResult<Vec<Item>> {
        self.enter().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_attribute(
        &self,
        table: &str,
        id: &str,
        attribute: &str,
        value: Value,
    ) -> ItemStoreResult<bool> {
        self.enter().await?;
        let mut tables = self.tables.write().await;
        match tables.get_mut(table).and_then(|items| items.get_mut(id)) {
            Some(item) => {
                item.insert(attribute.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
