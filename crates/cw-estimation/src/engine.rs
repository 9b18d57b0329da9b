//! The estimation engine: task registry, estimation, scheduling, feedback.
//!
//! The engine is `Clone` and safe to share across async callers: the task
//! registry and the profile store live behind `tokio::sync::RwLock`, so
//! reads run concurrently while per-task and per-profile updates are
//! serialized. Estimates are replaced atomically under the write lock, never
//! torn. Lock order is always tasks before profiles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cw_core::{
    Clock, IdGen, SystemClock, Task, TaskComplexity, TaskEstimate, TaskKind, TaskStatus,
    TeamWorkload, UuidGen,
};

use crate::baseline::{base_duration_hours, default_spread_hours};
use crate::profile::AgentPerformanceProfile;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("task {0} not found")]
    NotFound(Uuid),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("task {0} has no scheduled estimate")]
    DependencyNotEstimated(Uuid),
    #[error("cyclic dependency detected at task {0}")]
    CyclicDependency(Uuid),
}

pub type Result<T> = std::result::Result<T, EstimationError>;

/// Floor for point estimates, in hours. Keeps ratios well-defined.
const MIN_ESTIMATE_HOURS: f64 = 0.01;

// ---------------------------------------------------------------------------
// Confidence interval mapping
// ---------------------------------------------------------------------------

/// Standard-normal quantile anchors for symmetric intervals, interpolated
/// linearly in between. Monotone over (0, 1].
const Z_TABLE: [(f64, f64); 9] = [
    (0.0, 0.0),
    (0.5, 0.674),
    (0.6, 0.842),
    (0.7, 1.036),
    (0.8, 1.282),
    (0.9, 1.645),
    (0.95, 1.960),
    (0.99, 2.576),
    (1.0, 3.291),
];

fn z_for_confidence(confidence: f64) -> f64 {
    for pair in Z_TABLE.windows(2) {
        let (c0, z0) = pair[0];
        let (c1, z1) = pair[1];
        if confidence <= c1 {
            let t = (confidence - c0) / (c1 - c0);
            return z0 + t * (z1 - z0);
        }
    }
    Z_TABLE[Z_TABLE.len() - 1].1
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 3_600_000.0).max(0.0)
}

// ---------------------------------------------------------------------------
// NewTask
// ---------------------------------------------------------------------------

/// Parameters for task registration.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub complexity: TaskComplexity,
    pub assigned_agent_id: Option<String>,
    pub dependencies: Vec<Uuid>,
    pub parent_task_id: Option<Uuid>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, kind: TaskKind, complexity: TaskComplexity) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind,
            complexity,
            assigned_agent_id: None,
            dependencies: Vec::new(),
            parent_task_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_agent_id = Some(agent_id.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_parent(mut self, parent_task_id: Uuid) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }
}

// ---------------------------------------------------------------------------
// EstimationEngine
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EstimationEngine {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
    profiles: Arc<RwLock<HashMap<String, AgentPerformanceProfile>>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGen>,
}

impl EstimationEngine {
    pub fn new() -> Self {
        Self::with_capabilities(Arc::new(SystemClock), Arc::new(UuidGen))
    }

    /// Construct with injected clock and id generation, for deterministic
    /// hosts and tests.
    pub fn with_capabilities(clock: Arc<dyn Clock>, ids: Arc<dyn IdGen>) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            clock,
            ids,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a task. Dependencies must reference already-registered
    /// tasks. The registry is append-only: tasks are never deleted, so the
    /// completion history stays replayable.
    pub async fn create_task(&self, spec: NewTask) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        for dep in &spec.dependencies {
            if !tasks.contains_key(dep) {
                return Err(EstimationError::InvalidArgument(format!(
                    "unknown dependency {dep}"
                )));
            }
        }
        if let Some(parent) = spec.parent_task_id {
            if !tasks.contains_key(&parent) {
                return Err(EstimationError::InvalidArgument(format!(
                    "unknown parent task {parent}"
                )));
            }
        }

        let now = self.clock.now();
        let mut task = Task::new(self.ids.next(), spec.title, spec.kind, spec.complexity, now);
        task.description = spec.description;
        task.assigned_agent_id = spec.assigned_agent_id;
        task.dependencies = spec.dependencies;
        task.parent_task_id = spec.parent_task_id;

        debug!(task_id = %task.id, kind = ?task.kind, "task registered");
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    /// Add a dependency edge to an existing task. Both tasks must already
    /// be registered; self-dependencies are rejected. Acyclicity is not
    /// checked here — cycles surface as `CyclicDependency` from
    /// [`critical_path`](Self::critical_path).
    pub async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> Result<Task> {
        if task_id == depends_on {
            return Err(EstimationError::InvalidArgument(
                "task cannot depend on itself".into(),
            ));
        }
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&depends_on) {
            return Err(EstimationError::NotFound(depends_on));
        }
        let task = tasks
            .get_mut(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;
        if !task.dependencies.contains(&depends_on) {
            task.dependencies.push(depends_on);
            task.updated_at = self.clock.now();
        }
        Ok(task.clone())
    }

    pub async fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    /// Snapshot of an agent's performance profile, if one exists yet.
    pub async fn profile(&self, agent_id: &str) -> Option<AgentPerformanceProfile> {
        self.profiles.read().await.get(agent_id).cloned()
    }

    // -----------------------------------------------------------------------
    // Estimation
    // -----------------------------------------------------------------------

    /// Produce a duration estimate with a symmetric confidence interval,
    /// replacing any prior estimate for the task.
    ///
    /// The point estimate is the `(kind, complexity)` base prior scaled by
    /// the agent's historical actual/estimated ratio (kind bucket first,
    /// complexity bucket as fallback, 1.0 cold start). The interval half
    /// width is `z(confidence) x spread`, where spread comes from the
    /// matching bucket's ratio variance or the complexity default.
    pub async fn estimate_task(
        &self,
        task_id: Uuid,
        agent_id: &str,
        confidence_level: f64,
    ) -> Result<TaskEstimate> {
        if !(confidence_level > 0.0 && confidence_level <= 1.0) {
            return Err(EstimationError::InvalidArgument(format!(
                "confidence_level must be in (0, 1], got {confidence_level}"
            )));
        }

        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;

        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentPerformanceProfile::new(agent_id));

        let base = base_duration_hours(task.kind, task.complexity);
        let adjustment = profile.adjustment_factor(task.kind, task.complexity);
        let point = (base * adjustment).max(MIN_ESTIMATE_HOURS);

        let spread = profile
            .ratio_std_dev(task.kind, task.complexity)
            .map(|s| s * base)
            .unwrap_or_else(|| default_spread_hours(task.complexity));
        let half_width = z_for_confidence(confidence_level) * spread;

        let estimate = TaskEstimate {
            task_id,
            agent_id: agent_id.to_string(),
            estimated_duration_hours: point,
            confidence_level,
            lower_bound_hours: (point - half_width).max(0.0),
            upper_bound_hours: point + half_width,
            estimated_start_time: None,
            estimated_completion_time: None,
            created_at: self.clock.now(),
        };

        debug!(
            task_id = %task_id,
            agent_id = %agent_id,
            hours = point,
            adjustment,
            "estimate produced"
        );

        task.assigned_agent_id = Some(agent_id.to_string());
        task.estimate = Some(estimate.clone());
        task.updated_at = self.clock.now();
        Ok(estimate)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Compute the task's estimated start and completion from its own
    /// estimate and the scheduled completions of its not-yet-completed
    /// dependencies.
    ///
    /// Consistency is at-least-once: if an upstream estimate changes,
    /// callers re-invoke `schedule_task` downstream; nothing propagates
    /// automatically.
    pub async fn schedule_task(&self, task_id: Uuid) -> Result<Task> {
        let now = self.clock.now();
        let mut tasks = self.tasks.write().await;

        let task = tasks
            .get(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;
        if task.estimate.is_none() {
            return Err(EstimationError::DependencyNotEstimated(task_id));
        }

        let mut start = now;
        for dep_id in task.dependencies.clone() {
            let dep = tasks
                .get(&dep_id)
                .ok_or(EstimationError::NotFound(dep_id))?;
            if dep.status == TaskStatus::Completed {
                continue;
            }
            let dep_completion = dep
                .estimate
                .as_ref()
                .and_then(|e| e.estimated_completion_time)
                .ok_or(EstimationError::DependencyNotEstimated(dep_id))?;
            start = start.max(dep_completion);
        }

        let task = tasks
            .get_mut(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;
        // Checked above; re-borrow after releasing the dependency reads.
        let Some(estimate) = task.estimate.as_mut() else {
            return Err(EstimationError::DependencyNotEstimated(task_id));
        };
        estimate.estimated_start_time = Some(start);
        estimate.estimated_completion_time =
            Some(start + hours_to_duration(estimate.estimated_duration_hours));
        task.updated_at = now;

        debug!(task_id = %task_id, start = %start, "task scheduled");
        Ok(task.clone())
    }

    // -----------------------------------------------------------------------
    // Status transitions and profile feedback
    // -----------------------------------------------------------------------

    /// Apply a status transition. Entering `InProgress` stamps the actual
    /// start; entering `Completed` stamps the actual completion and, when a
    /// measured duration exists, folds the actual/estimated ratio into the
    /// assigned agent's profile in the same logical step.
    pub async fn update_task_status(&self, task_id: Uuid, new_status: TaskStatus) -> Result<Task> {
        let now = self.clock.now();
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;

        if !task.status.can_transition_to(&new_status) {
            return Err(EstimationError::InvalidTransition {
                from: task.status,
                to: new_status,
            });
        }

        match new_status {
            TaskStatus::InProgress => {
                // Resuming from Blocked/Delayed keeps the original start.
                if task.actual_start_time.is_none() {
                    task.actual_start_time = Some(now);
                }
            }
            TaskStatus::Completed => {
                task.actual_completion_time = Some(now);
                if let Some(estimate) = &task.estimate {
                    let mut profiles = self.profiles.write().await;
                    let profile = profiles
                        .entry(estimate.agent_id.clone())
                        .or_insert_with(|| AgentPerformanceProfile::new(&estimate.agent_id));
                    match task.actual_duration_hours() {
                        Some(actual) => {
                            let ratio = actual / estimate.estimated_duration_hours;
                            profile.record_ratio(task.kind, task.complexity, ratio);
                            info!(
                                task_id = %task_id,
                                agent_id = %estimate.agent_id,
                                ratio,
                                "profile feedback applied"
                            );
                        }
                        None => {
                            // Completed straight from NotStarted: no measured
                            // duration, so the task is excluded from accuracy.
                            debug!(task_id = %task_id, "completed without start; no ratio recorded");
                        }
                    }
                    profile.total_tasks_completed += 1;
                }
            }
            _ => {}
        }

        task.status = new_status;
        task.updated_at = now;
        Ok(task.clone())
    }

    // -----------------------------------------------------------------------
    // ETA
    // -----------------------------------------------------------------------

    /// Scheduled completion time, extended while in progress once elapsed
    /// time exceeds the estimate. The extension scales the elapsed time by
    /// the in-flight overrun ratio, so it is monotone non-decreasing as time
    /// passes and equals the static estimate when nothing has elapsed.
    pub async fn task_eta(&self, task_id: Uuid) -> Result<DateTime<Utc>> {
        let tasks = self.tasks.read().await;
        let task = tasks
            .get(&task_id)
            .ok_or(EstimationError::NotFound(task_id))?;
        let estimate = task
            .estimate
            .as_ref()
            .ok_or(EstimationError::DependencyNotEstimated(task_id))?;
        let static_eta = estimate
            .estimated_completion_time
            .ok_or(EstimationError::DependencyNotEstimated(task_id))?;

        if task.status == TaskStatus::InProgress {
            if let Some(start) = task.actual_start_time {
                let elapsed = elapsed_hours(start, self.clock.now());
                let estimated = estimate.estimated_duration_hours;
                if elapsed > estimated {
                    let projected = start + hours_to_duration(elapsed * (elapsed / estimated));
                    warn!(task_id = %task_id, elapsed, estimated, "in-flight overrun extends ETA");
                    return Ok(projected.max(static_eta));
                }
            }
        }
        Ok(static_eta)
    }

    // -----------------------------------------------------------------------
    // Critical path
    // -----------------------------------------------------------------------

    /// Longest dependency-respecting chain among `task_ids`, weighted by
    /// estimated duration (tasks without an estimate weigh zero).
    /// Dependencies outside the given set are ignored. Returns the chain in
    /// execution order.
    pub async fn critical_path(&self, task_ids: &[Uuid]) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let selected: HashSet<Uuid> = task_ids.iter().copied().collect();
        for id in &selected {
            if !tasks.contains_key(id) {
                return Err(EstimationError::NotFound(*id));
            }
        }

        let mut dist: HashMap<Uuid, f64> = HashMap::new();
        let mut pred: HashMap<Uuid, Option<Uuid>> = HashMap::new();
        let mut on_stack: HashSet<Uuid> = HashSet::new();

        let mut end: Option<Uuid> = None;
        let mut best = f64::NEG_INFINITY;
        for &id in &selected {
            let total = longest_chain(id, &tasks, &selected, &mut dist, &mut pred, &mut on_stack)?;
            if total > best {
                best = total;
                end = Some(id);
            }
        }

        let mut path = Vec::new();
        let mut cursor = end;
        while let Some(id) = cursor {
            // Every visited node has entries in both maps.
            if let Some(task) = tasks.get(&id) {
                path.push(task.clone());
            }
            cursor = pred.get(&id).copied().flatten();
        }
        path.reverse();
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Workload
    // -----------------------------------------------------------------------

    /// Aggregate task counts and estimated hours per agent. Agents with no
    /// tasks get a zeroed entry. Pure read, no mutation.
    pub async fn team_workload(&self, agent_ids: &[String]) -> HashMap<String, TeamWorkload> {
        let tasks = self.tasks.read().await;
        let mut out: HashMap<String, TeamWorkload> = agent_ids
            .iter()
            .map(|id| (id.clone(), TeamWorkload::default()))
            .collect();

        for task in tasks.values() {
            let Some(agent_id) = task.assigned_agent_id.as_deref() else {
                continue;
            };
            let Some(load) = out.get_mut(agent_id) else {
                continue;
            };
            load.total_tasks += 1;
            if let Some(estimate) = &task.estimate {
                load.total_estimated_hours += estimate.estimated_duration_hours;
            }
            if task.status == TaskStatus::InProgress {
                load.in_progress_tasks += 1;
            }
        }
        out
    }
}

impl Default for EstimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Longest finishing chain ending at `id`, memoized in `dist`. `on_stack`
/// holds the current DFS spine; re-entering it means a dependency cycle.
fn longest_chain(
    id: Uuid,
    tasks: &HashMap<Uuid, Task>,
    selected: &HashSet<Uuid>,
    dist: &mut HashMap<Uuid, f64>,
    pred: &mut HashMap<Uuid, Option<Uuid>>,
    on_stack: &mut HashSet<Uuid>,
) -> Result<f64> {
    if let Some(&d) = dist.get(&id) {
        return Ok(d);
    }
    if !on_stack.insert(id) {
        return Err(EstimationError::CyclicDependency(id));
    }

    let task = tasks.get(&id).ok_or(EstimationError::NotFound(id))?;
    let mut best = 0.0;
    let mut best_dep = None;
    for &dep in &task.dependencies {
        if !selected.contains(&dep) {
            continue;
        }
        let d = longest_chain(dep, tasks, selected, dist, pred, on_stack)?;
        if d > best {
            best = d;
            best_dep = Some(dep);
        }
    }

    let duration = task
        .estimate
        .as_ref()
        .map(|e| e.estimated_duration_hours)
        .unwrap_or(0.0);
    let total = best + duration;

    on_stack.remove(&id);
    dist.insert(id, total);
    pred.insert(id, best_dep);
    Ok(total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::{ManualClock, SequentialIdGen};

    fn deterministic_engine() -> (EstimationEngine, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let engine = EstimationEngine::with_capabilities(
            Arc::new(clock.clone()),
            Arc::new(SequentialIdGen::new()),
        );
        (engine, clock)
    }

    // -- z mapping --

    #[test]
    fn z_is_monotone_in_confidence() {
        let mut prev = 0.0;
        for i in 1..=100 {
            let c = i as f64 / 100.0;
            let z = z_for_confidence(c);
            assert!(z >= prev, "z not monotone at c={c}");
            prev = z;
        }
    }

    #[test]
    fn z_matches_anchors() {
        assert!((z_for_confidence(0.8) - 1.282).abs() < 1e-9);
        assert!((z_for_confidence(0.95) - 1.960).abs() < 1e-9);
    }

    // -- Registration --

    #[tokio::test]
    async fn create_task_registers_and_returns() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert!(engine.get_task(task.id).await.is_some());
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_dependency() {
        let (engine, _) = deterministic_engine();
        let err = engine
            .create_task(
                NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple)
                    .with_dependencies(vec![Uuid::new_v4()]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_parent() {
        let (engine, _) = deterministic_engine();
        let err = engine
            .create_task(
                NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple)
                    .with_parent(Uuid::new_v4()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::InvalidArgument(_)));
    }

    // -- Estimation --

    #[tokio::test]
    async fn cold_start_estimate_uses_base_prior() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Moderate))
            .await
            .unwrap();
        let estimate = engine.estimate_task(task.id, "a1", 0.8).await.unwrap();

        let base = base_duration_hours(TaskKind::Coding, TaskComplexity::Moderate);
        assert!((estimate.estimated_duration_hours - base).abs() < 1e-9);
        assert!(estimate.lower_bound_hours <= estimate.estimated_duration_hours);
        assert!(estimate.estimated_duration_hours <= estimate.upper_bound_hours);
        assert!(estimate.lower_bound_hours >= 0.0);
    }

    #[tokio::test]
    async fn estimate_rejects_bad_confidence() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        for c in [0.0, -0.5, 1.5] {
            let err = engine.estimate_task(task.id, "a1", c).await.unwrap_err();
            assert!(matches!(err, EstimationError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn estimate_unknown_task_is_not_found() {
        let (engine, _) = deterministic_engine();
        let err = engine
            .estimate_task(Uuid::new_v4(), "a1", 0.8)
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::NotFound(_)));
    }

    #[tokio::test]
    async fn reestimation_replaces_prior_estimate() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        engine.estimate_task(task.id, "a1", 0.8).await.unwrap();
        let second = engine.estimate_task(task.id, "a2", 0.9).await.unwrap();

        let stored = engine.get_task(task.id).await.unwrap();
        let current = stored.estimate.unwrap();
        assert_eq!(current.agent_id, "a2");
        assert!((current.confidence_level - second.confidence_level).abs() < 1e-9);
    }

    #[tokio::test]
    async fn interval_width_grows_with_confidence() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Moderate))
            .await
            .unwrap();
        let narrow = engine.estimate_task(task.id, "a1", 0.5).await.unwrap();
        let wide = engine.estimate_task(task.id, "a1", 0.95).await.unwrap();
        assert!(wide.interval_width_hours() >= narrow.interval_width_hours());
    }

    #[tokio::test]
    async fn estimate_monotone_in_complexity() {
        let (engine, _) = deterministic_engine();
        let mut previous = 0.0;
        for level in 1..=5u8 {
            let complexity = TaskComplexity::from_level(level).unwrap();
            let task = engine
                .create_task(NewTask::new("t", TaskKind::Coding, complexity))
                .await
                .unwrap();
            let estimate = engine.estimate_task(task.id, "a1", 0.8).await.unwrap();
            assert!(
                estimate.estimated_duration_hours >= previous,
                "estimate shrank at level {level}"
            );
            previous = estimate.estimated_duration_hours;
        }
    }

    // -- Status transitions --

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let (engine, _) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        engine
            .update_task_status(task.id, TaskStatus::Completed)
            .await
            .unwrap();
        let err = engine
            .update_task_status(task.id, TaskStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EstimationError::InvalidTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::InProgress
            }
        ));
    }

    #[tokio::test]
    async fn resume_keeps_original_start_time() {
        let (engine, clock) = deterministic_engine();
        let task = engine
            .create_task(NewTask::new("t", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        engine
            .update_task_status(task.id, TaskStatus::InProgress)
            .await
            .unwrap();
        let first_start = engine.get_task(task.id).await.unwrap().actual_start_time;

        clock.advance(Duration::hours(1));
        engine
            .update_task_status(task.id, TaskStatus::Blocked)
            .await
            .unwrap();
        clock.advance(Duration::hours(1));
        engine
            .update_task_status(task.id, TaskStatus::InProgress)
            .await
            .unwrap();

        let resumed = engine.get_task(task.id).await.unwrap();
        assert_eq!(resumed.actual_start_time, first_start);
    }

    // -- Workload --

    #[tokio::test]
    async fn workload_aggregates_per_agent() {
        let (engine, _) = deterministic_engine();
        let a = engine
            .create_task(NewTask::new("a", TaskKind::Coding, TaskComplexity::Simple))
            .await
            .unwrap();
        let b = engine
            .create_task(NewTask::new("b", TaskKind::Testing, TaskComplexity::Trivial))
            .await
            .unwrap();
        engine.estimate_task(a.id, "a1", 0.8).await.unwrap();
        engine.estimate_task(b.id, "a1", 0.8).await.unwrap();
        engine
            .update_task_status(a.id, TaskStatus::InProgress)
            .await
            .unwrap();

        let workload = engine.team_workload(&["a1".into(), "idle".into()]).await;
        let a1 = &workload["a1"];
        assert_eq!(a1.total_tasks, 2);
        assert_eq!(a1.in_progress_tasks, 1);
        assert!(a1.total_estimated_hours > 0.0);
        assert_eq!(workload["idle"], TeamWorkload::default());
    }
}
