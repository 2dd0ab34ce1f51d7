//! In-memory registry of one-shot jobs.
//!
//! Lifecycle per job: `registered -> claimed -> completed (evicted)`.
//!
//! - [`JobRegistry::register`] stores the job under a fresh [`JobId`] and
//!   schedules it on the backend. The first registration in the process also
//!   registers the registry itself as the backend's runner.
//! - [`JobRegistry::claim_and_run`] claims the job, runs it as the system
//!   identity and evicts it afterwards, whatever the outcome. A job id
//!   therefore resolves at most once.
//! - [`JobRegistry::run_detached`] does the same on a task owned by the
//!   registry, for callers whose future may be dropped (HTTP callbacks).
//!
//! Job state is volatile and lost on restart.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio_util::task::TaskTracker;
use toolz_core::identity::Identity;
use toolz_core::timing::Stopwatch;

use crate::job::{Job, JobConfig, JobId, JobOutcome, RunnerKey};
use crate::scheduler::{JobRunner, SchedulerBackend, SchedulerError};

/// Runner key the registry registers itself under.
pub const DEFAULT_RUNNER_KEY: &str = "io.reconquest.toolz:runner";

/// Failure cause reported when a job id is unknown.
pub const NO_SUCH_JOB: &str = "No such job";

/// Failure cause reported when another executor already claimed the job.
pub const ALREADY_CLAIMED: &str = "Job already claimed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Registered,
    Claimed,
}

/// Observable view of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub semantic_id: String,
    pub state: JobState,
}

struct Entry {
    job: Arc<dyn Job>,
    state: JobState,
}

/// Registry mapping job ids to their pending unit of work.
pub struct JobRegistry {
    entries: Mutex<HashMap<JobId, Entry>>,
    backend: Arc<dyn SchedulerBackend>,
    runner_key: RunnerKey,
    identity: Identity,
    activated: OnceCell<()>,
    /// Runs started through [`JobRegistry::run_detached`].
    detached: TaskTracker,
}

/// Removes the claimed entry when dropped, so eviction also happens when the
/// run panics or the running future is dropped.
struct EvictOnDrop<'a> {
    registry: &'a JobRegistry,
    job_id: &'a JobId,
}

impl Drop for EvictOnDrop<'_> {
    fn drop(&mut self) {
        self.registry.evict(self.job_id);
    }
}

impl JobRegistry {
    /// Create a registry that schedules on `backend` and runs jobs as
    /// `identity`.
    pub fn new(backend: Arc<dyn SchedulerBackend>, identity: Identity) -> Arc<Self> {
        Self::with_runner_key(backend, identity, RunnerKey::new(DEFAULT_RUNNER_KEY))
    }

    pub fn with_runner_key(
        backend: Arc<dyn SchedulerBackend>,
        identity: Identity,
        runner_key: RunnerKey,
    ) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            backend,
            runner_key,
            identity,
            activated: OnceCell::new(),
            detached: TaskTracker::new(),
        })
    }

    /// Register and schedule a job.
    ///
    /// Returns the new job id, or `None` if the backend refused; the failure
    /// is logged and the job is not kept.
    pub async fn register(self: &Arc<Self>, job: Arc<dyn Job>) -> Option<JobId> {
        let semantic_id = job.id().to_string();

        if let Err(e) = self.activate().await {
            tracing::error!(
                job = %semantic_id,
                runner_key = %self.runner_key,
                error = %e,
                "Unable to register job runner",
            );
            return None;
        }

        let job_id = JobId::generate(&semantic_id);
        let config = JobConfig {
            runner_key: self.runner_key.clone(),
            schedule: job.schedule(),
            run_mode: job.run_mode(),
        };

        // Inserted before scheduling so an immediate fire finds the entry.
        self.lock().insert(
            job_id.clone(),
            Entry {
                job,
                state: JobState::Registered,
            },
        );

        if let Err(e) = self.backend.schedule(job_id.clone(), config) {
            self.evict(&job_id);
            tracing::error!(
                job = %semantic_id,
                error = %e,
                "Unable to schedule job",
            );
            return None;
        }

        tracing::info!(job = %semantic_id, job_id = %job_id, "Registered job");
        Some(job_id)
    }

    /// Claim the job, run it once, and evict it.
    pub async fn claim_and_run(&self, job_id: &JobId) -> JobOutcome {
        let job = match self.claim(job_id) {
            Ok(job) => job,
            Err(outcome) => {
                tracing::warn!(job_id = %job_id, ?outcome, "Job could not be claimed");
                return outcome;
            }
        };
        let _evict = EvictOnDrop {
            registry: self,
            job_id,
        };

        tracing::debug!(job_id = %job_id, identity = %self.identity, "Running job");
        let stopwatch = Stopwatch::start();

        let outcome = match AssertUnwindSafe(job.run(&self.identity))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => JobOutcome::Success,
            Ok(Err(e)) => JobOutcome::failed(e.to_string()),
            Err(panic) => JobOutcome::failed(format!("job panicked: {}", panic_message(&*panic))),
        };

        match &outcome {
            JobOutcome::Success => tracing::info!(
                job_id = %job_id,
                elapsed_ms = %stopwatch.elapsed_ms(),
                "Job completed",
            ),
            JobOutcome::Failed { cause } => tracing::error!(
                job_id = %job_id,
                elapsed_ms = %stopwatch.elapsed_ms(),
                cause = cause.as_deref().unwrap_or("unknown"),
                "Job failed",
            ),
        }

        outcome
    }

    /// Like [`claim_and_run`](Self::claim_and_run), but the run happens on a
    /// task of its own. Dropping the returned future does not cancel the run;
    /// it still finishes, logs its outcome, and is awaited by
    /// [`shutdown`](Self::shutdown).
    pub async fn run_detached(self: &Arc<Self>, job_id: JobId) -> JobOutcome {
        let registry = Arc::clone(self);
        let handle = self
            .detached
            .spawn(async move { registry.claim_and_run(&job_id).await });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Detached job task did not finish");
                JobOutcome::failed(format!("job task did not finish: {e}"))
            }
        }
    }

    /// Wait for every detached run to finish.
    pub async fn shutdown(&self) {
        self.detached.close();
        self.detached.wait().await;
    }

    pub fn state(&self, job_id: &JobId) -> Option<JobState> {
        self.lock().get(job_id).map(|entry| entry.state)
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.lock().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All jobs that have not been evicted yet.
    pub fn pending(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> = self
            .lock()
            .iter()
            .map(|(id, entry)| JobSummary {
                id: id.clone(),
                semantic_id: entry.job.id().to_string(),
                state: entry.state,
            })
            .collect();
        jobs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        jobs
    }

    /// Register this registry as the backend's runner, once per process.
    async fn activate(self: &Arc<Self>) -> Result<(), SchedulerError> {
        self.activated
            .get_or_try_init(|| async {
                let runner: Arc<dyn JobRunner> = self.clone();
                self.backend.register_runner(self.runner_key.clone(), runner)
            })
            .await
            .map(|_| ())
    }

    fn claim(&self, job_id: &JobId) -> Result<Arc<dyn Job>, JobOutcome> {
        let mut entries = self.lock();
        match entries.get_mut(job_id) {
            None => Err(JobOutcome::failed(NO_SUCH_JOB)),
            Some(entry) if entry.state == JobState::Claimed => {
                Err(JobOutcome::failed(ALREADY_CLAIMED))
            }
            Some(entry) => {
                entry.state = JobState::Claimed;
                Ok(Arc::clone(&entry.job))
            }
        }
    }

    fn evict(&self, job_id: &JobId) {
        if self.lock().remove(job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Evicted job");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobRunner for JobRegistry {
    async fn run_job(&self, job_id: &JobId) -> JobOutcome {
        self.claim_and_run(job_id).await
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
