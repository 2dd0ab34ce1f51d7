//! The two toolz workloads.
//!
//! - [`provisioning::BulkProvisioningJob`] creates projects and repositories
//!   sequentially as a one-shot job.
//! - [`orchestrator::ChangeRequestOrchestrator`] turns a pushed ref batch into
//!   pull request tasks on a [`BoundedDispatcher`](toolz_worker::BoundedDispatcher),
//!   and enables the post-receive hook on new `pr-` repositories.

pub mod error;
pub mod orchestrator;
pub mod provisioning;

pub use error::PipelineError;
pub use orchestrator::{BatchCounters, BatchSummary, ChangeRequestOrchestrator, HookKeys};
pub use provisioning::{BulkProvisioningJob, ProvisioningReport};
