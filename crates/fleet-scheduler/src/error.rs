//! Scheduler error types.

use fleet_core::TaskState;
use thiserror::Error;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task already scheduled: {0}")]
    AlreadyScheduled(String),

    #[error("invalid task: {0}")]
    Validation(String),

    #[error("cannot {action} task {id} in state {from}")]
    InvalidTransition {
        id: String,
        from: TaskState,
        action: &'static str,
    },

    #[error("task {id} generation {generation} is no longer current")]
    StaleRun { id: String, generation: u64 },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
