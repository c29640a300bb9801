//! Store - Document Item Stores
//!
//! TigerStyle: a narrow key-value port so the document registrar can be
//! exercised in memory and run against DynamoDB unchanged.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ItemStore Trait                         │
//! │   put / get / delete / scan / conditional attribute update   │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │ MemoryItemStore │           │ DynamoItemStore │
//! │ (tests, local)  │           │ (feature gated) │
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! Items are JSON objects keyed by their string `id` attribute. A store
//! knows nothing about buildings or residents.

mod memory;

#[cfg(feature = "dynamodb")]
mod dynamodb;

use async_trait::async_trait;
use serde_json::Value;

use crate::constants::ID_ATTRIBUTE_NAME;
use crate::registry::BoxError;

pub use memory::MemoryItemStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoItemStore;

/// A stored document: attribute name to value.
pub type Item = serde_json::Map<String, Value>;

/// Result alias for item store calls.
pub type ItemStoreResult<T> = Result<T, ItemStoreError>;

/// Item store failure.
#[derive(Debug, thiserror::Error)]
pub enum ItemStoreError {
    /// The store could not be reached or returned unusable data.
    #[error("item store unavailable: {message}")]
    Unavailable {
        /// What failed
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// The store refused the request, e.g. a malformed item.
    #[error("item store rejected request: {message}")]
    Rejected {
        /// Why it was refused
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },
}

impl ItemStoreError {
    /// Create an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a `Rejected` error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            source: None,
        }
    }
}

/// Minimal document storage used by [`crate::DocumentRegistrar`].
#[async_trait]
pub trait ItemStore: Send + Sync + 'static {
    /// Insert or replace the item under its `id` attribute.
    async fn put_item(&self, table: &str, item: Item) -> ItemStoreResult<()>;

    /// Fetch one item by id.
    async fn get_item(&self, table: &str, id: &str) -> ItemStoreResult<Option<Item>>;

    /// Delete one item by id. Deleting an absent item succeeds.
    async fn delete_item(&self, table: &str, id: &str) -> ItemStoreResult<()>;

    /// Every item in the table, in no particular order.
    async fn scan(&self, table: &str) -> ItemStoreResult<Vec<Item>>;

    /// Set one attribute on an existing item in a single conditional write.
    ///
    /// Returns `false`, without writing, when no item has that id.
    async fn update_attribute(
        &self,
        table: &str,
        id: &str,
        attribute: &str,
        value: Value,
    ) -> ItemStoreResult<bool>;
}

/// The `id` attribute of an item, when present and a string.
#[must_use]
pub fn item_id(item: &Item) -> Option<&str> {
    item.get(ID_ATTRIBUTE_NAME).and_then(Value::as_str)
}
