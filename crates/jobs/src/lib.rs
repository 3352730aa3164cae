// crates/jobs/src/lib.rs
//! Progress tracking for long-running jobs.
//!
//! A [`Job`] owns an ordered list of tasks and the observers subscribed to
//! its update stream. The work driver creates jobs through a
//! [`JobController`], creates tasks on them and drives each task through a
//! [`TaskHandle`]. Every mutation is serialized to a [`JobUpdate`] and pushed
//! to all observers as it happens.

pub mod controller;
pub mod error;
pub mod job;
pub mod observer;
pub mod task;
pub mod types;

pub use controller::JobController;
pub use error::JobError;
pub use job::{Job, TaskKey};
pub use observer::{ObserverId, ObserverRx, ObserverTx};
pub use task::{TaskHandle, TaskLog, DEFAULT_PROGRESS_LABEL};
pub use types::{
    JobSnapshot, JobStatus, JobSummary, JobUpdate, LogEntry, LogLevel, TaskSnapshot,
};
