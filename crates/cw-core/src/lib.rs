pub mod clock;
pub mod ids;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{IdGen, SequentialIdGen, UuidGen};
pub use types::{
    Task, TaskComplexity, TaskEstimate, TaskKind, TaskStatus, TeamWorkload,
};
