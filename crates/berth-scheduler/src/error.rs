//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while decoding input for the scheduler.
///
/// Scheduling itself never fails; only the event boundary does.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
