//! Cumulative counters for repository operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OpStats
// ---------------------------------------------------------------------------

/// Per-operation call and latency counters. Monotone until reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub total_latency_us: u64,
}

impl OpStats {
    pub fn record(&mut self, success: bool, latency_us: u64) {
        if self.calls == 0 || latency_us < self.min_latency_us {
            self.min_latency_us = latency_us;
        }
        if latency_us > self.max_latency_us {
            self.max_latency_us = latency_us;
        }
        self.calls += 1;
        self.total_latency_us += latency_us;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    pub fn avg_latency_us(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total_latency_us as f64 / self.calls as f64
    }
}

// ---------------------------------------------------------------------------
// RepoMetrics
// ---------------------------------------------------------------------------

/// Snapshot of all repository counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub ops: HashMap<String, OpStats>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl RepoMetrics {
    pub fn record_op(&mut self, op: &str, success: bool, latency_us: u64) {
        self.ops.entry(op.to_string()).or_default().record(success, latency_us);
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
