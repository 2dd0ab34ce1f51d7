//! One-shot job contract, identifiers, and result object.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use toolz_core::identity::Identity;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique key of a registered job: `<semantic id>:<uuid v4>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id for a job with the given semantic id.
    pub fn generate(semantic_id: &str) -> Self {
        Self(format!("{semantic_id}:{}", uuid::Uuid::new_v4()))
    }

    /// Wrap an id received from outside (e.g. a scheduler callback).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The semantic part of the id, before the last `:`.
    pub fn semantic_id(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(id, _)| id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a job runner is registered with a scheduler backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunnerKey(String);

impl RunnerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Scheduling policy
// ---------------------------------------------------------------------------

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire exactly once after `delay`.
    RunOnce { delay: Duration },
}

impl Schedule {
    pub fn run_once_now() -> Self {
        Schedule::RunOnce {
            delay: Duration::ZERO,
        }
    }
}

/// How many executors may run a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Only one process of a cooperating cluster executes the job.
    RunOncePerCluster,
}

/// Everything a backend needs to schedule a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub runner_key: RunnerKey,
    pub schedule: Schedule,
    pub run_mode: RunMode,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result reported back to the scheduler for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl JobOutcome {
    pub fn failed(cause: impl Into<String>) -> Self {
        JobOutcome::Failed {
            cause: Some(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }
}

/// Error a job's unit of work can end with.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl JobError {
    pub fn from_source(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        JobError::Source(Box::new(err))
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A unit of work that runs once in the background.
#[async_trait]
pub trait Job: Send + Sync {
    /// Semantic id used for logging and as the prefix of the [`JobId`].
    fn id(&self) -> &str;

    fn schedule(&self) -> Schedule {
        Schedule::run_once_now()
    }

    fn run_mode(&self) -> RunMode {
        RunMode::RunOncePerCluster
    }

    /// Execute the work as `identity`.
    async fn run(&self, identity: &Identity) -> Result<(), JobError>;
}
