//! Scheduler backend contract and the in-process implementation.
//!
//! A backend owns *when* a job fires; the registered [`JobRunner`] owns
//! *what* running it means. Cluster-wide run-once enforcement belongs to the
//! backend and is not reimplemented by the local one, which only ever runs in
//! a single process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tokio_util::task::TaskTracker;

use crate::job::{JobConfig, JobId, JobOutcome, RunnerKey, Schedule};

/// Errors raised while registering runners or scheduling jobs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("No job runner registered for key {0}")]
    UnknownRunner(RunnerKey),

    #[error("Scheduler backend failure: {0}")]
    Backend(String),
}

/// Callback a backend invokes when a scheduled job fires.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job_id: &JobId) -> JobOutcome;
}

/// Backend that fires scheduled jobs at its own discretion.
pub trait SchedulerBackend: Send + Sync {
    fn register_runner(
        &self,
        key: RunnerKey,
        runner: Arc<dyn JobRunner>,
    ) -> Result<(), SchedulerError>;

    fn schedule(&self, job_id: JobId, config: JobConfig) -> Result<(), SchedulerError>;
}

/// In-process backend: every scheduled job becomes a Tokio task.
///
/// Runners are held weakly. A runner that is dropped stops receiving jobs,
/// and a runner that holds the scheduler does not form a cycle with it.
pub struct LocalScheduler {
    runners: Mutex<HashMap<RunnerKey, Weak<dyn JobRunner>>>,
    tracker: TaskTracker,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self {
            runners: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Stop accepting new jobs and wait for fired ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Local scheduler drained");
    }

    fn runners(&self) -> MutexGuard<'_, HashMap<RunnerKey, Weak<dyn JobRunner>>> {
        self.runners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBackend for LocalScheduler {
    fn register_runner(
        &self,
        key: RunnerKey,
        runner: Arc<dyn JobRunner>,
    ) -> Result<(), SchedulerError> {
        tracing::debug!(runner_key = %key, "Registering job runner");
        self.runners().insert(key, Arc::downgrade(&runner));
        Ok(())
    }

    fn schedule(&self, job_id: JobId, config: JobConfig) -> Result<(), SchedulerError> {
        if self.tracker.is_closed() {
            return Err(SchedulerError::Backend("scheduler is shut down".into()));
        }

        let runner = self
            .runners()
            .get(&config.runner_key)
            .filter(|runner| runner.strong_count() > 0)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownRunner(config.runner_key.clone()))?;

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;

        let Schedule::RunOnce { delay } = config.schedule;
        self.tracker.spawn_on(
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let Some(runner) = runner.upgrade() else {
                    tracing::warn!(job_id = %job_id, "Job runner is gone, skipping job");
                    return;
                };
                let outcome = runner.run_job(&job_id).await;
                match &outcome {
                    JobOutcome::Success => {
                        tracing::debug!(job_id = %job_id, "Scheduled job finished");
                    }
                    JobOutcome::Failed { cause } => {
                        tracing::warn!(
                            job_id = %job_id,
                            cause = cause.as_deref().unwrap_or("unknown"),
                            "Scheduled job failed",
                        );
                    }
                }
            },
            &handle,
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RunMode;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingRunner {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl JobRunner for CountingRunner {
        async fn run_job(&self, _job_id: &JobId) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            JobOutcome::Success
        }
    }

    fn config(key: &str, delay: Duration) -> JobConfig {
        JobConfig {
            runner_key: RunnerKey::new(key),
            schedule: Schedule::RunOnce { delay },
            run_mode: RunMode::RunOncePerCluster,
        }
    }

    #[tokio::test]
    async fn scheduling_without_runner_fails() {
        let scheduler = LocalScheduler::new();

        let result = scheduler.schedule(JobId::generate("x"), config("missing", Duration::ZERO));

        assert_matches!(result, Err(SchedulerError::UnknownRunner(_)));
    }

    #[tokio::test]
    async fn scheduled_job_fires_once() {
        let scheduler = LocalScheduler::new();
        let runner = Arc::new(CountingRunner {
            runs: AtomicUsize::new(0),
        });
        scheduler
            .register_runner(RunnerKey::new("k"), runner.clone())
            .unwrap();

        scheduler
            .schedule(JobId::generate("x"), config("k", Duration::ZERO))
            .unwrap();
        scheduler.shutdown().await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_runner_no_longer_accepts_jobs() {
        let scheduler = LocalScheduler::new();
        let runner = Arc::new(CountingRunner {
            runs: AtomicUsize::new(0),
        });
        scheduler.register_runner(RunnerKey::new("k"), runner).unwrap();

        let result = scheduler.schedule(JobId::generate("x"), config("k", Duration::ZERO));

        assert_matches!(result, Err(SchedulerError::UnknownRunner(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn runner_dropped_during_delay_skips_the_job() {
        let scheduler = LocalScheduler::new();
        let runner = Arc::new(CountingRunner {
            runs: AtomicUsize::new(0),
        });
        scheduler
            .register_runner(RunnerKey::new("k"), runner.clone())
            .unwrap();
        scheduler
            .schedule(JobId::generate("x"), config("k", Duration::from_secs(30)))
            .unwrap();

        let weak = Arc::downgrade(&runner);
        drop(runner);

        // Neither the runner map nor the pending job keeps the runner alive.
        assert!(weak.upgrade().is_none());
        tokio::time::advance(Duration::from_secs(31)).await;
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_waits_for_its_delay() {
        let scheduler = LocalScheduler::new();
        let runner = Arc::new(CountingRunner {
            runs: AtomicUsize::new(0),
        });
        scheduler
            .register_runner(RunnerKey::new("k"), runner.clone())
            .unwrap();

        scheduler
            .schedule(JobId::generate("x"), config("k", Duration::from_secs(30)))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);

        scheduler.shutdown().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schedule_after_shutdown_is_rejected() {
        let scheduler = LocalScheduler::new();
        scheduler
            .register_runner(
                RunnerKey::new("k"),
                Arc::new(CountingRunner {
                    runs: AtomicUsize::new(0),
                }),
            )
            .unwrap();
        scheduler.shutdown().await;

        let result = scheduler.schedule(JobId::generate("x"), config("k", Duration::ZERO));

        assert_matches!(result, Err(SchedulerError::Backend(_)));
    }
}
