//! Static effort priors used before an agent has any history.

use cw_core::{TaskComplexity, TaskKind};

/// Effort curve per complexity level, in hours for a nominal coding task.
/// Roughly doubles per level, like story points.
fn complexity_hours(complexity: TaskComplexity) -> f64 {
    match complexity {
        TaskComplexity::Trivial => 1.0,
        TaskComplexity::Simple => 2.0,
        TaskComplexity::Moderate => 4.0,
        TaskComplexity::Complex => 8.0,
        TaskComplexity::VeryComplex => 16.0,
    }
}

/// Relative weight of a task kind against nominal coding effort.
fn kind_weight(kind: TaskKind) -> f64 {
    match kind {
        TaskKind::Coding => 1.0,
        TaskKind::Research => 1.2,
        TaskKind::Documentation => 0.6,
        TaskKind::Design => 0.8,
        TaskKind::Testing => 0.7,
        TaskKind::Review => 0.5,
        TaskKind::Planning => 0.6,
        TaskKind::Deployment => 0.9,
        TaskKind::Maintenance => 0.8,
        TaskKind::Other => 1.0,
    }
}

/// Base duration prior for a `(kind, complexity)` pair. Strictly increasing
/// in complexity for every kind.
pub fn base_duration_hours(kind: TaskKind, complexity: TaskComplexity) -> f64 {
    kind_weight(kind) * complexity_hours(complexity)
}

/// Cold-start interval spread, proportional to complexity.
pub fn default_spread_hours(complexity: TaskComplexity) -> f64 {
    0.5 * complexity.level() as f64
}
