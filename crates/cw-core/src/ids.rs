//! Injected identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Unique-id capability for tasks.
pub trait IdGen: Send + Sync {
    fn next(&self) -> Uuid;
}

/// Random v4 UUIDs, the production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGen;

impl IdGen for UuidGen {
    fn next(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic counter-backed ids for tests and replay tooling.
#[derive(Debug, Default)]
pub struct SequentialIdGen {
    counter: AtomicU64,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}
