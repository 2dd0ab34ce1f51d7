//! Execution infrastructure for toolz.
//!
//! - [`dispatcher::BoundedDispatcher`] runs fire-and-forget tasks on a fixed
//!   number of workers.
//! - [`registry::JobRegistry`] tracks one-shot jobs from registration until
//!   they have run once, and is the runner a [`scheduler::SchedulerBackend`]
//!   calls back into.
//! - [`job`] holds the job contract and its identifiers.

pub mod dispatcher;
pub mod job;
pub mod registry;
pub mod scheduler;

pub use dispatcher::{BoundedDispatcher, DispatchError, DispatcherStats};
pub use job::{Job, JobConfig, JobError, JobId, JobOutcome, RunMode, RunnerKey, Schedule};
pub use registry::{JobRegistry, JobState, JobSummary};
pub use scheduler::{JobRunner, LocalScheduler, SchedulerBackend, SchedulerError};
