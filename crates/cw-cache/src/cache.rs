//! Read-through TTL cache with collection-scoped write invalidation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use cw_core::{Clock, SystemClock};

use crate::metrics::RepoMetrics;
use crate::store::{KnowledgeStore, StoreError};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for collection-scoped entries.
    pub ttl_secs: u64,
    /// Short TTL for ad-hoc entries (similarity searches etc.), which are
    /// exempt from write invalidation.
    pub adhoc_ttl_secs: u64,
    /// Soft cap on cached entries; exceeded inserts trigger an eviction
    /// pass (expired entries first, then oldest-inserted).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            adhoc_ttl_secs: 30,
            max_entries: 10_000,
        }
    }
}

/// How a cached key relates to the store's collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope {
    /// Tracked in the invalidation index; evicted when the collection is
    /// written. Read-your-writes holds for these keys.
    Collection(String),
    /// Never write-invalidated; only ages out via the short TTL.
    AdHoc,
}

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: DateTime<Utc>,
    ttl_secs: u64,
}

impl CacheEntry {
    /// Valid iff `now - inserted_at < ttl_secs`.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.inserted_at).num_seconds() < self.ttl_secs as i64
    }
}

// ---------------------------------------------------------------------------
// CachedRepository
// ---------------------------------------------------------------------------

/// Caching layer composed around any [`KnowledgeStore`].
///
/// Never holds more than one internal lock at a time, so concurrent readers
/// and writers cannot deadlock; each entry is replaced atomically (evict,
/// then re-populate on the next read — never updated in place).
#[derive(Clone)]
pub struct CachedRepository {
    store: Arc<dyn KnowledgeStore>,
    config: CacheConfig,
    entries: Arc<RwLock<AHashMap<String, CacheEntry>>>,
    /// Coarse collection -> cache-keys index driving write invalidation.
    collections: Arc<RwLock<AHashMap<String, HashSet<String>>>>,
    metrics: Arc<RwLock<RepoMetrics>>,
    clock: Arc<dyn Clock>,
}

impl CachedRepository {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self::with_capabilities(store, CacheConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(store: Arc<dyn KnowledgeStore>, config: CacheConfig) -> Self {
        Self::with_capabilities(store, config, Arc::new(SystemClock))
    }

    /// Construct with an injected clock so TTL expiry is testable.
    pub fn with_capabilities(
        store: Arc<dyn KnowledgeStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            entries: Arc::new(RwLock::new(AHashMap::new())),
            collections: Arc::new(RwLock::new(AHashMap::new())),
            metrics: Arc::new(RwLock::new(RepoMetrics::default())),
            clock,
        }
    }

    /// Deterministic cache key: operation name and arguments joined by `:`.
    pub fn cache_key(op: &str, args: &[&str]) -> String {
        let mut key = String::from(op);
        for arg in args {
            key.push(':');
            key.push_str(arg);
        }
        key
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read-through lookup. Fresh cached entries are served directly;
    /// expired entries are lazily evicted; misses fetch from the store and
    /// populate the cache with the scope's TTL. Absent store values are not
    /// cached. Store failures propagate unchanged.
    pub async fn get(
        &self,
        op: &str,
        args: &[&str],
        scope: KeyScope,
    ) -> Result<Option<Value>, StoreError> {
        let key = Self::cache_key(op, args);
        let now = self.clock.now();
        let started = Instant::now();

        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get(&key) {
                if entry.is_fresh(now) {
                    let value = entry.value.clone();
                    drop(entries);
                    debug!(%key, "cache hit");
                    let mut metrics = self.metrics.write().await;
                    metrics.record_hit();
                    metrics.record_op(op, true, elapsed_us(started));
                    return Ok(Some(value));
                }
                entries.remove(&key);
            }
        }

        debug!(%key, "cache miss");
        let fetched = match self.store.fetch(&key).await {
            Ok(value) => value,
            Err(err) => {
                let mut metrics = self.metrics.write().await;
                metrics.record_miss();
                metrics.record_op(op, false, elapsed_us(started));
                return Err(err);
            }
        };

        if let Some(value) = &fetched {
            let ttl_secs = match &scope {
                KeyScope::Collection(_) => self.config.ttl_secs,
                KeyScope::AdHoc => self.config.adhoc_ttl_secs,
            };
            {
                let mut entries = self.entries.write().await;
                if entries.len() >= self.config.max_entries {
                    evict(&mut entries, self.config.max_entries, now);
                }
                entries.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        inserted_at: now,
                        ttl_secs,
                    },
                );
            }
            if let KeyScope::Collection(collection) = &scope {
                self.collections
                    .write()
                    .await
                    .entry(collection.clone())
                    .or_default()
                    .insert(key);
            }
        }

        let mut metrics = self.metrics.write().await;
        metrics.record_miss();
        metrics.record_op(op, true, elapsed_us(started));
        Ok(fetched)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write through to the store, then invalidate every cached key tracked
    /// for the collection. A failed store write leaves the cache untouched.
    pub async fn write(
        &self,
        collection: &str,
        key: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.mutate("write", collection, || self.store.write(key, value))
            .await
    }

    /// Delete from the store, then invalidate the collection's cached keys.
    pub async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.mutate("delete", collection, || self.store.delete(key))
            .await
    }

    async fn mutate<F, Fut>(
        &self,
        op: &str,
        collection: &str,
        call: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), StoreError>>,
    {
        let started = Instant::now();
        let result = call().await;
        if result.is_ok() {
            self.invalidate_collection(collection).await;
        }
        let mut metrics = self.metrics.write().await;
        metrics.record_op(op, result.is_ok(), elapsed_us(started));
        result
    }

    /// Drop every cached key tracked for `collection`.
    pub async fn invalidate_collection(&self, collection: &str) {
        let keys = self.collections.write().await.remove(collection);
        let Some(keys) = keys else {
            return;
        };
        let mut entries = self.entries.write().await;
        for key in &keys {
            entries.remove(key);
        }
        info!(collection, count = keys.len(), "collection invalidated");
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Drop all cached entries and the invalidation index. Metrics are
    /// unaffected; use [`reset_metrics`](Self::reset_metrics) for those.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.collections.write().await.clear();
    }

    pub async fn reset_metrics(&self) {
        *self.metrics.write().await = RepoMetrics::default();
    }

    pub async fn metrics(&self) -> RepoMetrics {
        self.metrics.read().await.clone()
    }

    /// Number of currently cached entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}

/// Capacity pass: drop expired entries, then oldest-inserted until under
/// the cap. Stale keys left in the collection index are harmless; removal
/// there is a no-op on next invalidation.
fn evict(entries: &mut AHashMap<String, CacheEntry>, max_entries: usize, now: DateTime<Utc>) {
    entries.retain(|_, e| e.is_fresh(now));
    if entries.len() < max_entries {
        return;
    }
    let mut by_age: Vec<(String, DateTime<Utc>)> = entries
        .iter()
        .map(|(k, e)| (k.clone(), e.inserted_at))
        .collect();
    by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
    let excess = entries.len() + 1 - max_entries;
    for (key, _) in by_age.into_iter().take(excess) {
        entries.remove(&key);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Duration;
    use cw_core::ManualClock;
    use serde_json::json;

    async fn seeded_repo() -> (CachedRepository, ManualClock, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store
            .write("list_documents:docs", json!(["a", "b"]))
            .await
            .unwrap();
        let clock = ManualClock::new(Utc::now());
        let repo = CachedRepository::with_capabilities(
            store.clone(),
            CacheConfig::default(),
            Arc::new(clock.clone()),
        );
        (repo, clock, store)
    }

    // -- Keys --

    #[test]
    fn cache_key_is_deterministic_concatenation() {
        assert_eq!(
            CachedRepository::cache_key("search", &["docs", "query"]),
            "search:docs:query"
        );
        assert_eq!(CachedRepository::cache_key("list_collections", &[]), "list_collections");
    }

    // -- Read path --

    #[tokio::test]
    async fn miss_then_hit_within_ttl() {
        let (repo, _, _) = seeded_repo().await;
        let scope = KeyScope::Collection("docs".into());

        let first = repo
            .get("list_documents", &["docs"], scope.clone())
            .await
            .unwrap();
        let second = repo.get("list_documents", &["docs"], scope).await.unwrap();
        assert_eq!(first, second);

        let metrics = repo.metrics().await;
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.cache_hits, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let (repo, clock, store) = seeded_repo().await;
        let scope = KeyScope::Collection("docs".into());

        repo.get("list_documents", &["docs"], scope.clone())
            .await
            .unwrap();
        store
            .write("list_documents:docs", json!(["a", "b", "c"]))
            .await
            .unwrap();

        clock.advance(Duration::seconds(CacheConfig::default().ttl_secs as i64 + 1));
        let refetched = repo
            .get("list_documents", &["docs"], scope)
            .await
            .unwrap();
        assert_eq!(refetched, Some(json!(["a", "b", "c"])));
        assert_eq!(repo.metrics().await.cache_misses, 2);
    }

    #[tokio::test]
    async fn adhoc_entries_use_short_ttl() {
        let (repo, clock, store) = seeded_repo().await;
        store
            .write("search:docs:q", json!(["hit"]))
            .await
            .unwrap();

        repo.get("search", &["docs", "q"], KeyScope::AdHoc)
            .await
            .unwrap();
        clock.advance(Duration::seconds(
            CacheConfig::default().adhoc_ttl_secs as i64 + 1,
        ));
        repo.get("search", &["docs", "q"], KeyScope::AdHoc)
            .await
            .unwrap();
        assert_eq!(repo.metrics().await.cache_misses, 2);
    }

    #[tokio::test]
    async fn absent_values_are_not_cached() {
        let (repo, _, _) = seeded_repo().await;
        let scope = KeyScope::Collection("docs".into());

        assert!(repo
            .get("get_document", &["docs", "missing"], scope.clone())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .get("get_document", &["docs", "missing"], scope)
            .await
            .unwrap()
            .is_none());
        // Both lookups went to the store.
        assert_eq!(repo.metrics().await.cache_misses, 2);
        assert!(repo.is_empty().await);
    }

    // -- Invalidation --

    #[tokio::test]
    async fn write_invalidates_collection_scoped_keys() {
        let (repo, _, store) = seeded_repo().await;
        let scope = KeyScope::Collection("docs".into());

        repo.get("list_documents", &["docs"], scope.clone())
            .await
            .unwrap();
        store
            .write("list_documents:docs", json!(["a", "b", "new"]))
            .await
            .unwrap();
        repo.write("docs", "doc:new", json!({"body": "text"}))
            .await
            .unwrap();

        // Within TTL, but the write must force a store round trip.
        let value = repo.get("list_documents", &["docs"], scope).await.unwrap();
        assert_eq!(value, Some(json!(["a", "b", "new"])));
        assert_eq!(repo.metrics().await.cache_misses, 2);
    }

    #[tokio::test]
    async fn write_leaves_adhoc_keys_alone() {
        let (repo, _, store) = seeded_repo().await;
        store.write("search:docs:q", json!(["old"])).await.unwrap();

        repo.get("search", &["docs", "q"], KeyScope::AdHoc)
            .await
            .unwrap();
        repo.write("docs", "doc:new", json!({})).await.unwrap();

        let cached = repo
            .get("search", &["docs", "q"], KeyScope::AdHoc)
            .await
            .unwrap();
        assert_eq!(cached, Some(json!(["old"])));
        assert_eq!(repo.metrics().await.cache_hits, 1);
    }

    #[tokio::test]
    async fn delete_invalidates_collection() {
        let (repo, _, _) = seeded_repo().await;
        let scope = KeyScope::Collection("docs".into());

        repo.get("list_documents", &["docs"], scope.clone())
            .await
            .unwrap();
        repo.delete("docs", "doc:a").await.unwrap();

        repo.get("list_documents", &["docs"], scope).await.unwrap();
        assert_eq!(repo.metrics().await.cache_misses, 2);
    }

    #[tokio::test]
    async fn invalidating_unknown_collection_is_a_noop() {
        let (repo, _, _) = seeded_repo().await;
        repo.invalidate_collection("ghosts").await;
        assert!(repo.is_empty().await);
    }

    // -- Eviction --

    #[tokio::test]
    async fn capacity_eviction_drops_oldest() {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..4 {
            store.write(&format!("get:{i}"), json!(i)).await.unwrap();
        }
        let clock = ManualClock::new(Utc::now());
        let repo = CachedRepository::with_capabilities(
            store,
            CacheConfig {
                max_entries: 2,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        );

        for i in 0..4 {
            repo.get("get", &[&i.to_string()], KeyScope::AdHoc)
                .await
                .unwrap();
            clock.advance(Duration::seconds(1));
        }
        assert!(repo.len().await <= 2);
    }

    // -- Maintenance --

    #[tokio::test]
    async fn clear_drops_entries_but_keeps_metrics() {
        let (repo, _, _) = seeded_repo().await;
        repo.get(
            "list_documents",
            &["docs"],
            KeyScope::Collection("docs".into()),
        )
        .await
        .unwrap();

        repo.clear().await;
        assert!(repo.is_empty().await);
        assert_eq!(repo.metrics().await.cache_misses, 1);

        repo.reset_metrics().await;
        assert_eq!(repo.metrics().await.cache_misses, 0);
    }
}
