// crates/jobs/src/types.rs
//! Status vocabulary, log entries and the wire messages pushed to observers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Status shared by jobs and tasks.
///
/// `NotStarted` is only ever the initial status of a job. The last four
/// variants are terminal and are reached through `finish_*` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    NotStarted,
    InProgress,
    Success,
    Error,
    Abandoned,
    Info,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Error | JobStatus::Abandoned | JobStatus::Info
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not-started",
            JobStatus::InProgress => "in-progress",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
            JobStatus::Abandoned => "abandoned",
            JobStatus::Info => "info",
        }
    }

    /// Validate a non-finishing status change from `self` to `next`.
    pub(crate) fn check_set(self, next: JobStatus) -> Result<(), JobError> {
        if self.is_terminal() {
            return Err(JobError::AlreadyFinished { status: self });
        }
        if next.is_terminal() || (next == JobStatus::NotStarted && self != JobStatus::NotStarted) {
            return Err(JobError::InvalidTransition {
                from: self,
                to: next,
            });
        }
        Ok(())
    }

    /// Validate finishing with `result`.
    pub(crate) fn check_finish(self, result: JobStatus) -> Result<(), JobError> {
        if self.is_terminal() {
            return Err(JobError::AlreadyFinished { status: self });
        }
        if !result.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: self,
                to: result,
            });
        }
        Ok(())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a task log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry in a task's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    Message {
        timestamp: DateTime<Utc>,
        message: String,
        level: LogLevel,
    },
    Progress {
        timestamp: DateTime<Utc>,
        value: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
        label: String,
    },
}

/// Full serialization of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub title: String,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub log: Vec<LogEntry>,
    pub progress: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_max: Option<u64>,
    pub progress_label: String,
}

/// Compact projection of a job used by list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub title: String,
    pub id: String,
    pub created_by: String,
    pub job_type: String,
    pub status: JobStatus,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// Full serialization of a job, including its tasks.
///
/// `attachments` is the JSON-encoded attachment map, or `None` if nothing
/// was ever attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub title: String,
    pub id: String,
    pub created_by: String,
    pub job_type: String,
    pub status: JobStatus,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskSnapshot>,
    pub attachments: Option<String>,
}

impl JobSnapshot {
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            title: self.title.clone(),
            id: self.id.clone(),
            created_by: self.created_by.clone(),
            job_type: self.job_type.clone(),
            status: self.status,
            start: self.start,
            end: self.end,
        }
    }
}

/// Every message pushed to a job's observers, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobUpdate {
    /// Snapshot sent once to a newly attached observer.
    Job(JobSnapshot),
    /// A task was created.
    Task(TaskSnapshot),
    /// Job status change, or task status change when `task` is set.
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<String>,
        timestamp: DateTime<Utc>,
        status: JobStatus,
    },
    Message {
        task: String,
        timestamp: DateTime<Utc>,
        message: String,
        level: LogLevel,
    },
    Progress {
        task: String,
        timestamp: DateTime<Utc>,
        value: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
        label: String,
    },
}

impl JobUpdate {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
