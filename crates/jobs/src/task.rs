// crates/jobs/src/task.rs
//! A named unit of work inside a job.
//!
//! `Task` holds the state and lives inside its job. Callers drive it through
//! a `TaskHandle`, which locks the parent job for every call so a task
//! mutation and its broadcast happen together, in call order.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::JobError;
use crate::job::Job;
use crate::types::{JobStatus, JobUpdate, LogEntry, LogLevel, TaskSnapshot};

/// Label template used until a caller supplies one.
pub const DEFAULT_PROGRESS_LABEL: &str = "%value% / %max%";

/// Progress value forced on finish when no max was set.
const FINISHED_PROGRESS: u64 = 100;

pub(crate) struct Task {
    title: String,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    status: JobStatus,
    progress: u64,
    progress_max: Option<u64>,
    progress_label: String,
    log: Vec<LogEntry>,
}

impl Task {
    pub(crate) fn new(title: String, initial_message: Option<&str>) -> Self {
        let mut task = Self {
            title,
            start: Utc::now(),
            end: None,
            status: JobStatus::InProgress,
            progress: 0,
            progress_max: None,
            progress_label: DEFAULT_PROGRESS_LABEL.to_string(),
            log: Vec::new(),
        };
        if let Some(message) = initial_message {
            task.push_message(LogLevel::Info, message.to_string());
        }
        task
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.status
    }

    pub(crate) fn progress(&self) -> u64 {
        self.progress
    }

    pub(crate) fn progress_max(&self) -> Option<u64> {
        self.progress_max
    }

    pub(crate) fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Substitute `%value%` and `%max%` into the label template.
    pub(crate) fn format_progress_label(&self) -> String {
        let max = self
            .progress_max
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        self.progress_label
            .replace("%value%", &self.progress.to_string())
            .replace("%max%", &max)
    }

    pub(crate) fn push_message(&mut self, level: LogLevel, message: String) -> JobUpdate {
        let timestamp = Utc::now();
        self.log.push(LogEntry::Message {
            timestamp,
            message: message.clone(),
            level,
        });
        JobUpdate::Message {
            task: self.title.clone(),
            timestamp,
            message,
            level,
        }
    }

    pub(crate) fn set_progress_max(&mut self, max: u64) -> JobUpdate {
        self.progress_max = Some(max);
        self.record_progress()
    }

    pub(crate) fn set_progress(&mut self, value: u64, label: Option<&str>) -> JobUpdate {
        self.progress = value;
        if let Some(label) = label {
            self.progress_label = label.to_string();
        }
        self.record_progress()
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) -> Result<JobUpdate, JobError> {
        self.status.check_set(status)?;
        self.status = status;
        Ok(self.status_update())
    }

    /// Close the task: status, closing message, progress pinned to its max.
    pub(crate) fn finish(&mut self, result: JobStatus) -> Result<Vec<JobUpdate>, JobError> {
        self.status.check_finish(result)?;
        self.status = result;
        let status = self.status_update();
        let message = self.push_message(LogLevel::Info, format!("Finished with status {result}"));
        self.progress = self.progress_max.unwrap_or(FINISHED_PROGRESS);
        let progress = self.record_progress();
        self.end = Some(Utc::now());
        Ok(vec![status, message, progress])
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            title: self.title.clone(),
            start: self.start,
            end: self.end,
            status: self.status,
            log: self.log.clone(),
            progress: self.progress,
            progress_max: self.progress_max,
            progress_label: self.format_progress_label(),
        }
    }

    fn status_update(&self) -> JobUpdate {
        JobUpdate::Status {
            task: Some(self.title.clone()),
            timestamp: Utc::now(),
            status: self.status,
        }
    }

    /// Append the current progress to the log and build its update.
    fn record_progress(&mut self) -> JobUpdate {
        let timestamp = Utc::now();
        let label = self.format_progress_label();
        let entry = LogEntry::Progress {
            timestamp,
            value: self.progress,
            max: self.progress_max,
            label: label.clone(),
        };
        self.log.push(entry);
        JobUpdate::Progress {
            task: self.title.clone(),
            timestamp,
            value: self.progress,
            max: self.progress_max,
            label,
        }
    }
}

/// Per-task logging capability.
///
/// Every entry is appended to the task's own log and forwarded to the
/// parent job's observers as a `message` update tagged with the task title.
pub trait TaskLog {
    fn log(&self, level: LogLevel, message: impl Into<String>);

    fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

/// Handle used by the work driver to update one task of a job.
///
/// Holds the parent job alive; a task never outlives its job.
#[derive(Clone)]
pub struct TaskHandle {
    job: Arc<Job>,
    index: usize,
}

impl TaskHandle {
    pub(crate) fn new(job: Arc<Job>, index: usize) -> Self {
        Self { job, index }
    }

    /// Position of the task in its job.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    pub fn title(&self) -> String {
        self.job.read_task(self.index, |t| t.title().to_string())
    }

    pub fn status(&self) -> JobStatus {
        self.job.read_task(self.index, Task::status)
    }

    pub fn progress(&self) -> u64 {
        self.job.read_task(self.index, Task::progress)
    }

    pub fn progress_max(&self) -> Option<u64> {
        self.job.read_task(self.index, Task::progress_max)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.job.read_task(self.index, Task::end)
    }

    pub fn format_progress_label(&self) -> String {
        self.job.read_task(self.index, Task::format_progress_label)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.job.read_task(self.index, Task::snapshot)
    }

    pub fn set_progress_max(&self, max: u64) {
        self.job
            .mutate_task(self.index, |t| vec![t.set_progress_max(max)]);
    }

    /// Set the absolute progress value, optionally replacing the label template.
    pub fn set_progress(&self, value: u64, label: Option<&str>) {
        self.job
            .mutate_task(self.index, |t| vec![t.set_progress(value, label)]);
    }

    /// Advance progress by one.
    pub fn increment(&self) {
        self.increment_progress(1);
    }

    pub fn increment_progress(&self, amount: u64) {
        self.job.mutate_task(self.index, |t| {
            let value = t.progress().saturating_add(amount);
            vec![t.set_progress(value, None)]
        });
    }

    pub fn set_status(&self, status: JobStatus) -> Result<(), JobError> {
        self.job
            .try_mutate_task(self.index, |t| t.set_status(status).map(|u| vec![u]))
    }

    pub fn finish_task(&self, result: JobStatus) -> Result<(), JobError> {
        self.job.try_mutate_task(self.index, |t| t.finish(result))
    }
}

impl TaskLog for TaskHandle {
    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        self.job
            .mutate_task(self.index, |t| vec![t.push_message(level, message)]);
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("job_id", &self.job.id())
            .field("index", &self.index)
            .finish()
    }
}
