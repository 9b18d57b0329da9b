use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskKind
// ---------------------------------------------------------------------------

/// Categorical bucket key for historical performance tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Coding,
    Research,
    Documentation,
    Design,
    Testing,
    Review,
    Planning,
    Deployment,
    Maintenance,
    Other,
}

// ---------------------------------------------------------------------------
// TaskComplexity
// ---------------------------------------------------------------------------

/// Ordinal 1-5 difficulty rating, independent of kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl TaskComplexity {
    /// Numeric level, 1 (trivial) through 5 (very complex).
    pub fn level(&self) -> u8 {
        match self {
            TaskComplexity::Trivial => 1,
            TaskComplexity::Simple => 2,
            TaskComplexity::Moderate => 3,
            TaskComplexity::Complex => 4,
            TaskComplexity::VeryComplex => 5,
        }
    }

    /// Inverse of [`level`](Self::level). Out-of-range levels return `None`.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(TaskComplexity::Trivial),
            2 => Some(TaskComplexity::Simple),
            3 => Some(TaskComplexity::Moderate),
            4 => Some(TaskComplexity::Complex),
            5 => Some(TaskComplexity::VeryComplex),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
    Delayed,
}

impl TaskStatus {
    /// Returns `true` when a transition from `self` to `target` is valid.
    ///
    /// `NotStarted -> Completed` is deliberately allowed: bulk-import and
    /// retroactive-completion callers skip `InProgress`, at the cost of
    /// having no measured duration for that task.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::NotStarted, TaskStatus::InProgress)
                | (TaskStatus::NotStarted, TaskStatus::Completed)
                | (TaskStatus::NotStarted, TaskStatus::Blocked)
                | (TaskStatus::NotStarted, TaskStatus::Delayed)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Blocked)
                | (TaskStatus::InProgress, TaskStatus::Delayed)
                | (TaskStatus::Blocked, TaskStatus::InProgress)
                | (TaskStatus::Blocked, TaskStatus::Delayed)
                | (TaskStatus::Delayed, TaskStatus::InProgress)
                | (TaskStatus::Delayed, TaskStatus::Blocked)
        )
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// TaskEstimate
// ---------------------------------------------------------------------------

/// A duration estimate with a symmetric confidence interval.
///
/// Invariant: `0 <= lower_bound_hours <= estimated_duration_hours
/// <= upper_bound_hours`, and the interval widens monotonically with
/// `confidence_level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEstimate {
    pub task_id: Uuid,
    pub agent_id: String,
    pub estimated_duration_hours: f64,
    /// Stated confidence in the interval, in (0, 1].
    pub confidence_level: f64,
    pub lower_bound_hours: f64,
    pub upper_bound_hours: f64,
    /// Set by scheduling, not by estimation.
    pub estimated_start_time: Option<DateTime<Utc>>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TaskEstimate {
    /// Interval width in hours.
    pub fn interval_width_hours(&self) -> f64 {
        self.upper_bound_hours - self.lower_bound_hours
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub complexity: TaskComplexity,
    pub status: TaskStatus,
    pub assigned_agent_id: Option<String>,
    /// Tasks that must be `Completed` before this one may be scheduled.
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    /// Current estimate; re-estimation replaces it wholesale.
    pub estimate: Option<TaskEstimate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_completion_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        kind: TaskKind,
        complexity: TaskComplexity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            kind,
            complexity,
            status: TaskStatus::NotStarted,
            assigned_agent_id: None,
            dependencies: Vec::new(),
            parent_task_id: None,
            estimate: None,
            created_at: now,
            updated_at: now,
            actual_start_time: None,
            actual_completion_time: None,
        }
    }

    /// Measured duration in hours, when the task passed through
    /// `InProgress` on its way to `Completed`.
    pub fn actual_duration_hours(&self) -> Option<f64> {
        match (self.actual_start_time, self.actual_completion_time) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds() as f64 / 3_600_000.0)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TeamWorkload
// ---------------------------------------------------------------------------

/// Per-agent workload aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamWorkload {
    pub total_tasks: u64,
    pub total_estimated_hours: f64,
    pub in_progress_tasks: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
