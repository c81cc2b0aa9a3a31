//! Domain types: tasks, sprints, worklog entries.

pub mod sprint;
pub mod task;
pub mod worklog;

pub use sprint::{Sprint, SprintPhase, SprintSet};
pub use task::{
    Annotations, ExternalFields, GoalType, ParseEnumError, Priority, Task, TaskOrigin, TaskStatus,
    TicketType,
};
pub use worklog::WorklogEntry;
