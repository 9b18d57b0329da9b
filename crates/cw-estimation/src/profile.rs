//! Per-agent historical performance profiles.
//!
//! Each completed task contributes one actual/estimated duration ratio,
//! folded into running statistics with Welford's online algorithm. Replaying
//! the same completion log in order reproduces identical statistics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cw_core::{TaskComplexity, TaskKind};

// ---------------------------------------------------------------------------
// RunningStats
// ---------------------------------------------------------------------------

/// Online mean/variance accumulator (Welford).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    pub count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance; defined from the second observation on.
    pub fn variance(&self) -> Option<f64> {
        (self.count >= 2).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

// ---------------------------------------------------------------------------
// AgentPerformanceProfile
// ---------------------------------------------------------------------------

/// Running actual/estimated ratio statistics for one agent, bucketed by
/// task kind and by complexity level. Created lazily on the agent's first
/// estimation request; updated only on task completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformanceProfile {
    pub agent_id: String,
    by_kind: HashMap<TaskKind, RunningStats>,
    by_complexity: HashMap<u8, RunningStats>,
    overall: RunningStats,
    pub total_tasks_completed: u64,
}

impl AgentPerformanceProfile {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            by_kind: HashMap::new(),
            by_complexity: HashMap::new(),
            overall: RunningStats::default(),
            total_tasks_completed: 0,
        }
    }

    /// Fold one completed task's actual/estimated ratio into all three
    /// bucket levels.
    pub fn record_ratio(&mut self, kind: TaskKind, complexity: TaskComplexity, ratio: f64) {
        self.by_kind.entry(kind).or_default().push(ratio);
        self.by_complexity
            .entry(complexity.level())
            .or_default()
            .push(ratio);
        self.overall.push(ratio);
    }

    /// Multiplier applied to the base duration: the kind bucket's mean ratio
    /// when that bucket has history, else the complexity bucket's, else 1.0
    /// (cold start).
    pub fn adjustment_factor(&self, kind: TaskKind, complexity: TaskComplexity) -> f64 {
        self.by_kind
            .get(&kind)
            .and_then(RunningStats::mean)
            .or_else(|| {
                self.by_complexity
                    .get(&complexity.level())
                    .and_then(RunningStats::mean)
            })
            .unwrap_or(1.0)
    }

    /// Standard deviation of the ratio for the matching bucket, with the
    /// same kind-then-complexity fallback. `None` until a bucket has at
    /// least two samples.
    pub fn ratio_std_dev(&self, kind: TaskKind, complexity: TaskComplexity) -> Option<f64> {
        self.by_kind
            .get(&kind)
            .and_then(RunningStats::std_dev)
            .or_else(|| {
                self.by_complexity
                    .get(&complexity.level())
                    .and_then(RunningStats::std_dev)
            })
    }

    /// Aggregate accuracy in (0, 1]: 1.0 when the agent's mean ratio is
    /// exactly on-estimate, falling off as the mean drifts either way.
    pub fn overall_accuracy(&self) -> Option<f64> {
        self.overall.mean().map(|m| 1.0 / (1.0 + (m - 1.0).abs()))
    }

    pub fn kind_stats(&self, kind: TaskKind) -> Option<&RunningStats> {
        self.by_kind.get(&kind)
    }

    pub fn complexity_stats(&self, complexity: TaskComplexity) -> Option<&RunningStats> {
        self.by_complexity.get(&complexity.level())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
