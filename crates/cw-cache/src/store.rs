//! The backing-store capability.
//!
//! One trait covers any knowledge backend (vector index, relational table,
//! remote service). Backends surface outages as [`StoreError::Unavailable`];
//! the cache layer passes those through without retrying.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use ahash::AHashMap;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable knowledge store consumed by the cache layer. Calls may be
/// long-running; callers needing timeouts wrap their own deadline around
/// the implementation.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Map-backed store, the reference backend for hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<AHashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn fetch(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
