//! Read-through caching in front of a pluggable knowledge store.
//!
//! [`CachedRepository`] wraps any [`KnowledgeStore`] with a TTL cache keyed
//! by operation name and arguments. Collection-scoped reads are invalidated
//! when the collection is written (read-your-writes); ad-hoc reads such as
//! similarity searches only age out via a short TTL. Store failures pass
//! through uncaught; the cache never serves stale data to mask them.

pub mod cache;
pub mod metrics;
pub mod store;

pub use cache::{CacheConfig, CachedRepository, KeyScope};
pub use metrics::{OpStats, RepoMetrics};
pub use store::{InMemoryStore, KnowledgeStore, StoreError};
