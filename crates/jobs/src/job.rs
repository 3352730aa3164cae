// crates/jobs/src/job.rs
//! Aggregate root for one unit of long-running work and its live observers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::JobError;
use crate::observer::{self, Observer, ObserverId, ObserverTx};
use crate::task::{Task, TaskHandle};
use crate::types::{JobSnapshot, JobStatus, JobSummary, JobUpdate};

/// How to address a task inside a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKey<'a> {
    Index(usize),
    Title(&'a str),
}

impl<'a> TaskKey<'a> {
    /// Numeric keys address by position, anything else by title.
    pub fn parse(raw: &'a str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) => TaskKey::Index(index),
            Err(_) => TaskKey::Title(raw),
        }
    }
}

impl From<usize> for TaskKey<'_> {
    fn from(index: usize) -> Self {
        TaskKey::Index(index)
    }
}

impl<'a> From<&'a str> for TaskKey<'a> {
    fn from(title: &'a str) -> Self {
        TaskKey::Title(title)
    }
}

struct JobInner {
    title: String,
    status: JobStatus,
    end: Option<DateTime<Utc>>,
    tasks: Vec<Task>,
    /// Title -> position of the most recently created task with that title.
    task_indices: HashMap<String, usize>,
    attachments: Option<HashMap<String, Value>>,
    observers: Vec<Observer>,
}

/// A job: an ordered list of tasks, an overall status and the observers
/// receiving its update stream.
///
/// All state sits behind one mutex. Every mutation serializes its update
/// and pushes it to the observers before the lock is released, so observers
/// see updates in exactly the order the mutations happened, and an observer
/// attaching between two mutations gets a snapshot that already contains
/// the first and only the second as an incremental update.
pub struct Job {
    id: String,
    created_by: String,
    job_type: String,
    server: String,
    start: DateTime<Utc>,
    inner: Mutex<JobInner>,
}

impl Job {
    pub(crate) fn new(
        id: String,
        title: String,
        created_by: String,
        job_type: String,
        server: String,
    ) -> Self {
        Self {
            id,
            created_by,
            job_type,
            server,
            start: Utc::now(),
            inner: Mutex::new(JobInner {
                title,
                status: JobStatus::NotStarted,
                end: None,
                tasks: Vec::new(),
                task_indices: HashMap::new(),
                attachments: None,
                observers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!(job_id = %self.id, "Job mutex poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    fn broadcast(&self, inner: &mut JobInner, update: &JobUpdate) {
        observer::broadcast(&mut inner.observers, &self.id, update);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Origin tag used to filter job listings.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.lock().title = title.into();
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.lock().end
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Append a task and announce it to observers.
    ///
    /// The first task moves a `not-started` job to `in-progress`. A title
    /// already in use is shadowed: title lookups resolve to the new task.
    pub fn create_sub_task(
        self: &Arc<Self>,
        title: impl Into<String>,
        message: Option<&str>,
    ) -> TaskHandle {
        let title = title.into();
        let mut inner = self.lock();

        if inner.status == JobStatus::NotStarted {
            inner.status = JobStatus::InProgress;
            let update = JobUpdate::Status {
                task: None,
                timestamp: Utc::now(),
                status: JobStatus::InProgress,
            };
            self.broadcast(&mut inner, &update);
        }

        let task = Task::new(title.clone(), message);
        let update = JobUpdate::Task(task.snapshot());
        let index = inner.tasks.len();
        inner.tasks.push(task);
        if inner.task_indices.insert(title.clone(), index).is_some() {
            tracing::debug!(job_id = %self.id, task = %title, "Task title reused, shadowing earlier task");
        }
        self.broadcast(&mut inner, &update);
        drop(inner);

        tracing::debug!(job_id = %self.id, task = %title, index, "Task created");
        TaskHandle::new(Arc::clone(self), index)
    }

    /// Resolve a task by position or by title.
    pub fn get_task<'a>(self: &Arc<Self>, key: impl Into<TaskKey<'a>>) -> Option<TaskHandle> {
        let inner = self.lock();
        let index = match key.into() {
            TaskKey::Index(index) => (index < inner.tasks.len()).then_some(index),
            TaskKey::Title(title) => inner.task_indices.get(title).copied(),
        }?;
        drop(inner);
        Some(TaskHandle::new(Arc::clone(self), index))
    }

    /// Push an arbitrary update to every attached observer.
    pub fn update(&self, update: &JobUpdate) {
        let mut inner = self.lock();
        self.broadcast(&mut inner, update);
    }

    /// Change to a non-terminal status and broadcast it.
    pub fn set_status(&self, status: JobStatus) -> Result<(), JobError> {
        let mut inner = self.lock();
        inner.status.check_set(status)?;
        inner.status = status;
        let update = JobUpdate::Status {
            task: None,
            timestamp: Utc::now(),
            status,
        };
        self.broadcast(&mut inner, &update);
        Ok(())
    }

    /// Finish the job with a terminal `result`.
    ///
    /// Broadcasts the final status, then closes every observer. A job that
    /// is already finished is left untouched and the call returns
    /// `JobError::AlreadyFinished`.
    pub fn finish_job(&self, result: JobStatus) -> Result<(), JobError> {
        let mut inner = self.lock();
        inner.status.check_finish(result)?;
        let now = Utc::now();
        inner.status = result;
        inner.end = Some(now);
        let update = JobUpdate::Status {
            task: None,
            timestamp: now,
            status: result,
        };
        self.broadcast(&mut inner, &update);
        let closed = inner.observers.len();
        inner.observers.clear();
        drop(inner);

        tracing::info!(
            job_id = %self.id,
            status = %result,
            observers_closed = closed,
            "Job finished"
        );
        Ok(())
    }

    /// Attach an opaque value under `name`, replacing any previous value.
    pub fn add_attachment(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.lock()
            .attachments
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
    }

    pub fn attachment(&self, name: &str) -> Option<Value> {
        self.lock()
            .attachments
            .as_ref()
            .and_then(|map| map.get(name).cloned())
    }

    /// Attach an observer.
    ///
    /// The current snapshot goes to this observer alone before it joins the
    /// broadcast set. On a finished job the observer gets the snapshot and
    /// is closed right away.
    pub fn add_observer(&self, tx: ObserverTx) -> ObserverId {
        let id = ObserverId::next();
        let mut inner = self.lock();
        let snapshot = JobUpdate::Job(self.snapshot_locked(&inner));
        let observer = Observer::new(id, tx);

        let delivered = match snapshot.to_text() {
            Ok(text) => observer.send(&text),
            Err(e) => {
                tracing::error!(job_id = %self.id, error = %e, "Failed to serialize job snapshot");
                false
            }
        };

        if delivered && !inner.status.is_terminal() {
            inner.observers.push(observer);
            tracing::debug!(job_id = %self.id, observer_id = id.as_u64(), "Observer attached");
        }
        id
    }

    /// Detach an observer. Returns false if it was not attached.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut inner = self.lock();
        let before = inner.observers.len();
        inner.observers.retain(|o| o.id != id);
        let removed = inner.observers.len() != before;
        if removed {
            tracing::debug!(job_id = %self.id, observer_id = id.as_u64(), "Observer detached");
        }
        removed
    }

    pub fn summary(&self) -> JobSummary {
        let inner = self.lock();
        JobSummary {
            title: inner.title.clone(),
            id: self.id.clone(),
            created_by: self.created_by.clone(),
            job_type: self.job_type.clone(),
            status: inner.status,
            start: self.start,
            end: inner.end,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.lock();
        self.snapshot_locked(&inner)
    }

    fn snapshot_locked(&self, inner: &JobInner) -> JobSnapshot {
        let attachments = inner
            .attachments
            .as_ref()
            .and_then(|map| match serde_json::to_string(map) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    tracing::error!(job_id = %self.id, error = %e, "Failed to encode attachments");
                    None
                }
            });
        JobSnapshot {
            title: inner.title.clone(),
            id: self.id.clone(),
            created_by: self.created_by.clone(),
            job_type: self.job_type.clone(),
            status: inner.status,
            start: self.start,
            end: inner.end,
            tasks: inner.tasks.iter().map(Task::snapshot).collect(),
            attachments,
        }
    }

    /// True when the job is finished, ended at or before `cutoff`, and
    /// nobody is watching it.
    pub(crate) fn evictable(&self, cutoff: DateTime<Utc>) -> bool {
        let inner = self.lock();
        // `finish_job` drops every observer and `add_observer` never keeps
        // one on a finished job, so the last check only fails if those two
        // stop holding.
        inner.status.is_terminal()
            && inner.end.is_some_and(|end| end <= cutoff)
            && inner.observers.is_empty()
    }

    // Tasks are append-only and a `TaskHandle` is only built from an
    // existing position, so indexing below cannot go out of bounds.

    pub(crate) fn read_task<R>(&self, index: usize, f: impl FnOnce(&Task) -> R) -> R {
        let inner = self.lock();
        f(&inner.tasks[index])
    }

    pub(crate) fn mutate_task(&self, index: usize, f: impl FnOnce(&mut Task) -> Vec<JobUpdate>) {
        let mut inner = self.lock();
        let updates = f(&mut inner.tasks[index]);
        for update in &updates {
            self.broadcast(&mut inner, update);
        }
    }

    pub(crate) fn try_mutate_task(
        &self,
        index: usize,
        f: impl FnOnce(&mut Task) -> Result<Vec<JobUpdate>, JobError>,
    ) -> Result<(), JobError> {
        let mut inner = self.lock();
        let updates = f(&mut inner.tasks[index])?;
        for update in &updates {
            self.broadcast(&mut inner, update);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("job_type", &self.job_type)
            .field("server", &self.server)
            .field("status", &self.status())
            .finish()
    }
}
