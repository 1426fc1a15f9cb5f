mod common;
mod exception;
mod run;

pub use run::{Task, TaskOutcome, TaskOutcomeKind};

pub mod prelude;

#[macro_use]
pub(crate) mod macros;
