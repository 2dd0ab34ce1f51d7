//! Pull request workflows triggered by repository events.
//!
//! Two independent triggers:
//!
//! - a pushed ref batch ([`ChangeRequestOrchestrator::handle_ref_changes`]):
//!   the guard hook is disabled on the repository, then every `pr-open-*`
//!   branch gets a pull request to `master` and every `pr-merge-*` branch gets
//!   a pull request to `x-<branch>` that is merged right away. Each ref is one
//!   task on the shared [`BoundedDispatcher`]; the call returns once all tasks
//!   are queued.
//! - a created repository ([`ChangeRequestOrchestrator::handle_repository_created`]):
//!   repositories named `pr-*` (any case) get the post-receive hook enabled.
//!
//! All remote calls run as the configured system identity.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use toolz_core::identity::Identity;
use toolz_core::refs::{self, Intent, MinimalRef, RefChange};
use toolz_core::timing::Stopwatch;
use toolz_core::types::{CreatePullRequest, Repository};
use toolz_vcs::{impersonate, Session, VcsError, VcsResult, VcsService};
use toolz_worker::{BoundedDispatcher, DispatchError};

use crate::error::PipelineError;

/// Hook keys the orchestrator toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookKeys {
    /// Merge check that would block automatic merges; disabled per batch.
    pub guard: String,
    /// Hook that delivers ref batches; enabled on new `pr-` repositories.
    pub post_receive: String,
}

impl HookKeys {
    pub const DEFAULT_GUARD: &'static str = "io.reconquest.snake:snake-merge-check-hook";
    pub const DEFAULT_POST_RECEIVE: &'static str = "io.reconquest.toolz:post-receive-hook";
}

impl Default for HookKeys {
    fn default() -> Self {
        Self {
            guard: Self::DEFAULT_GUARD.to_string(),
            post_receive: Self::DEFAULT_POST_RECEIVE.to_string(),
        }
    }
}

/// Per-batch progress, shared by the batch's tasks.
#[derive(Debug, Default)]
pub struct BatchCounters {
    opened: AtomicU32,
    to_merge: AtomicU32,
    merged: AtomicU32,
}

impl BatchCounters {
    /// Pull requests opened for `pr-open-*` branches.
    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Pull requests created for `pr-merge-*` branches.
    pub fn to_merge(&self) -> u32 {
        self.to_merge.load(Ordering::SeqCst)
    }

    pub fn merged(&self) -> u32 {
        self.merged.load(Ordering::SeqCst)
    }
}

/// How a batch was split, returned before any task has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub opens: usize,
    pub merges: usize,
    pub ignored: usize,
}

pub struct ChangeRequestOrchestrator {
    service: Arc<dyn VcsService>,
    dispatcher: Arc<BoundedDispatcher>,
    identity: Identity,
    hooks: HookKeys,
}

impl ChangeRequestOrchestrator {
    pub fn new(
        service: Arc<dyn VcsService>,
        dispatcher: Arc<BoundedDispatcher>,
        identity: Identity,
    ) -> Self {
        Self {
            service,
            dispatcher,
            identity,
            hooks: HookKeys::default(),
        }
    }

    pub fn with_hook_keys(mut self, hooks: HookKeys) -> Self {
        self.hooks = hooks;
        self
    }

    /// Dispatch pull request tasks for a pushed ref batch.
    pub async fn handle_ref_changes(
        &self,
        repository: &Repository,
        changes: &[RefChange],
    ) -> Result<BatchSummary, PipelineError> {
        self.handle_ref_changes_tracked(repository, changes)
            .await
            .map(|(summary, _)| summary)
    }

    /// Like [`handle_ref_changes`](Self::handle_ref_changes), also returning
    /// the batch's counters.
    pub async fn handle_ref_changes_tracked(
        &self,
        repository: &Repository,
        changes: &[RefChange],
    ) -> Result<(BatchSummary, Arc<BatchCounters>), PipelineError> {
        let session = self.session();
        session
            .disable_hook(repository, &self.hooks.guard)
            .await?;

        let partition = refs::partition(changes);
        let summary = BatchSummary {
            opens: partition.opens.len(),
            merges: partition.merges.len(),
            ignored: partition.ignored + partition.non_branch,
        };
        let counters = Arc::new(BatchCounters::default());

        tracing::info!(
            repository = %repository.full_name(),
            opens = summary.opens,
            merges = summary.merges,
            ignored = summary.ignored,
            "Dispatching ref batch",
        );

        let batch_size = summary.opens + summary.merges;
        let mut queued = 0;

        for reference in partition.opens {
            let task = self.task(repository, reference, &counters, summary.opens);
            self.dispatcher
                .submit(task.label(Intent::Open), task.open())
                .map_err(|e| rejected(repository, queued, batch_size, e))?;
            queued += 1;
        }

        for reference in partition.merges {
            let task = self.task(repository, reference, &counters, summary.merges);
            self.dispatcher
                .submit(task.label(Intent::Merge), task.merge())
                .map_err(|e| rejected(repository, queued, batch_size, e))?;
            queued += 1;
        }

        Ok((summary, counters))
    }

    /// Enable the post-receive hook if `repository` is a `pr-` repository.
    ///
    /// Returns whether the hook was enabled.
    pub async fn handle_repository_created(&self, repository: &Repository) -> VcsResult<bool> {
        if !refs::is_pr_repository(&repository.name) {
            return Ok(false);
        }

        tracing::debug!(
            repository = %repository.full_name(),
            hook = %self.hooks.post_receive,
            "Enabling post-receive hook",
        );
        self.session()
            .enable_hook(repository, &self.hooks.post_receive)
            .await?;
        Ok(true)
    }

    fn session(&self) -> Session {
        impersonate(Arc::clone(&self.service), self.identity.clone())
    }

    fn task(
        &self,
        repository: &Repository,
        reference: MinimalRef,
        counters: &Arc<BatchCounters>,
        total: usize,
    ) -> RefTask {
        RefTask {
            session: self.session(),
            repository: repository.clone(),
            reference,
            counters: Arc::clone(counters),
            total,
        }
    }
}

/// Tasks already queued keep running after a rejected submit.
fn rejected(
    repository: &Repository,
    queued: usize,
    total: usize,
    source: DispatchError,
) -> PipelineError {
    tracing::warn!(
        repository = %repository.full_name(),
        queued,
        total,
        error = %source,
        "Ref batch only partly queued",
    );
    PipelineError::Dispatch {
        queued,
        total,
        source,
    }
}

/// One ref's unit of work, owned by its dispatcher task.
struct RefTask {
    session: Session,
    repository: Repository,
    reference: MinimalRef,
    counters: Arc<BatchCounters>,
    total: usize,
}

impl RefTask {
    fn label(&self, intent: Intent) -> String {
        format!(
            "{}:{}:{}",
            intent.label(),
            self.repository.full_name(),
            self.reference.display_id
        )
    }

    fn request(&self, intent: Intent) -> CreatePullRequest {
        CreatePullRequest {
            from_ref: self.reference.id.clone(),
            from_repository: self.repository.clone(),
            to_repository: self.repository.clone(),
            to_branch: intent.target_branch(&self.reference.display_id),
            title: self.reference.display_id.clone(),
        }
    }

    async fn open(self) -> Result<(), VcsError> {
        let timer = Stopwatch::start();
        self.session
            .create_pull_request(&self.request(Intent::Open))
            .await?;
        let current = self.counters.opened.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            current,
            total = self.total,
            branch = %self.reference.display_id,
            elapsed_ms = %timer.elapsed_ms(),
            "[open] created pull request",
        );
        Ok(())
    }

    async fn merge(self) -> Result<(), VcsError> {
        let timer = Stopwatch::start();
        let pull_request = self
            .session
            .create_pull_request(&self.request(Intent::Merge))
            .await?;
        let current = self.counters.to_merge.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            current,
            total = self.total,
            branch = %self.reference.display_id,
            elapsed_ms = %timer.elapsed_ms(),
            "[merge] created pull request",
        );

        let merge_timer = Stopwatch::start();
        self.session.merge_pull_request(&pull_request, true).await?;
        let merged = self.counters.merged.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            current = merged,
            total = self.total,
            branch = %self.reference.display_id,
            elapsed_ms = %merge_timer.elapsed_ms(),
            with_create_ms = %timer.elapsed_ms(),
            "Merged pull request",
        );
        Ok(())
    }
}
