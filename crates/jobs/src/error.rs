// crates/jobs/src/error.rs
use thiserror::Error;

use crate::types::JobStatus;

/// Errors returned by job and task status changes.
///
/// Lookups never error; they return `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("already finished with status {status}")]
    AlreadyFinished { status: JobStatus },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}
