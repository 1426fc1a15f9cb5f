mod task;
mod task_outcome;

pub use task::Task;
pub use task_outcome::{TaskOutcome, TaskOutcomeKind};
