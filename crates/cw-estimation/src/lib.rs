//! Duration estimation for agent-assigned tasks.
//!
//! The engine keeps a registry of tasks and one performance profile per
//! agent. Estimates start from a static `(kind, complexity)` prior and are
//! adjusted by the agent's historical actual/estimated ratio; completing a
//! task feeds the measured ratio back into the profile so the next estimate
//! for similar work reflects it.

pub mod baseline;
pub mod engine;
pub mod profile;

pub use engine::{EstimationEngine, EstimationError, NewTask, Result};
pub use profile::{AgentPerformanceProfile, RunningStats};
