use strum_macros::{AsRefStr, Display};

#[derive(Clone, Copy, Debug, AsRefStr, Display, PartialEq, Eq, Hash)]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}
