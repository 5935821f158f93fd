//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum OclError {
    /// Sampling was requested from a buffer holding no example.
    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// Every stored example belongs to the excluded task.
    #[error("No stored example outside of task {task}")]
    NoEligibleExamples {
        /// The excluded task id.
        task: usize,
    },

    /// Task ids must be non-decreasing over a run.
    #[error("Task id decreased from {current} to {given}")]
    TaskIdDecreased {
        /// Task id of the previous step.
        current: usize,

        /// Task id given to the current step.
        given: usize,
    },

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
