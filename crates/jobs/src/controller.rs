// crates/jobs/src/controller.rs
//! Directory of jobs known to the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::job::Job;

/// Registry mapping job IDs to jobs.
///
/// Constructed once and shared as `Arc<JobController>` by whoever needs it.
/// Finished jobs stay listed until `evict_finished` (or the sweeper spawned
/// by `spawn_sweeper`) removes them.
pub struct JobController {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl JobController {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a job under a freshly generated ID.
    pub fn create_job(
        &self,
        title: impl Into<String>,
        created_by: impl Into<String>,
        job_type: impl Into<String>,
        server: impl Into<String>,
    ) -> Arc<Job> {
        let id = uuid::Uuid::new_v4().to_string();
        let job = Arc::new(Job::new(
            id.clone(),
            title.into(),
            created_by.into(),
            job_type.into(),
            server.into(),
        ));

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(id.clone(), Arc::clone(&job));
            }
            Err(e) => tracing::error!("RwLock poisoned writing jobs map: {e}"),
        }
        tracing::info!(job_id = %id, job_type = %job.job_type(), server = %job.server(), "Job created");
        job
    }

    pub fn has_job(&self, id: &str) -> bool {
        match self.jobs.read() {
            Ok(jobs) => jobs.contains_key(id),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                false
            }
        }
    }

    pub fn get_job(&self, id: &str) -> Option<Arc<Job>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                None
            }
        }
    }

    /// Jobs whose origin tag equals `server` exactly.
    pub fn get_jobs(&self, server: &str) -> Vec<Arc<Job>> {
        match self.jobs.read() {
            Ok(jobs) => jobs
                .values()
                .filter(|job| job.server() == server)
                .cloned()
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Vec::new()
            }
        }
    }

    pub fn get_all_jobs(&self) -> Vec<Arc<Job>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.values().cloned().collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop finished jobs that ended more than `ttl` ago and have no
    /// observers attached. Returns how many were removed.
    pub fn evict_finished(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        match self.jobs.write() {
            Ok(mut jobs) => {
                let before = jobs.len();
                jobs.retain(|id, job| {
                    let evict = job.evictable(cutoff);
                    if evict {
                        tracing::debug!(job_id = %id, status = %job.status(), "Evicting finished job");
                    }
                    !evict
                });
                before - jobs.len()
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing jobs map: {e}");
                0
            }
        }
    }

    /// Run `evict_finished(ttl)` every `interval` on the tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = controller.evict_finished(ttl);
                if evicted > 0 {
                    tracing::info!(
                        evicted,
                        remaining = controller.len(),
                        "Evicted finished jobs"
                    );
                }
            }
        })
    }
}

impl Default for JobController {
    fn default() -> Self {
        Self::new()
    }
}
