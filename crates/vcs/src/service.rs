//! The VCS service contract and identity-scoped sessions.

use std::sync::Arc;

use async_trait::async_trait;
use toolz_core::identity::Identity;
use toolz_core::types::{CreatePullRequest, Project, PullRequest, Repository, ScmKind};

use crate::error::VcsResult;

/// Operations the toolz pipelines perform on the remote service.
///
/// Failures are never handled here; they propagate to the job or task
/// boundary that issued the call.
#[async_trait]
pub trait VcsService: Send + Sync {
    async fn create_project(&self, as_user: &Identity, key: &str, name: &str)
        -> VcsResult<Project>;

    async fn create_repository(
        &self,
        as_user: &Identity,
        project: &Project,
        name: &str,
        scm: ScmKind,
    ) -> VcsResult<Repository>;

    async fn create_pull_request(
        &self,
        as_user: &Identity,
        request: &CreatePullRequest,
    ) -> VcsResult<PullRequest>;

    /// Merge a pull request. With `auto_subject` the service generates the
    /// merge commit message.
    async fn merge_pull_request(
        &self,
        as_user: &Identity,
        pull_request: &PullRequest,
        auto_subject: bool,
    ) -> VcsResult<()>;

    async fn enable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()>;

    async fn disable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()>;
}

/// A service handle bound to one identity.
///
/// Each task builds its own session, so the identity is scoped to the task
/// and cannot leak into siblings.
#[derive(Clone)]
pub struct Session {
    service: Arc<dyn VcsService>,
    identity: Identity,
}

/// Run subsequent calls on `service` as `identity`.
pub fn impersonate(service: Arc<dyn VcsService>, identity: Identity) -> Session {
    Session { service, identity }
}

impl Session {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn create_project(&self, key: &str, name: &str) -> VcsResult<Project> {
        self.service.create_project(&self.identity, key, name).await
    }

    pub async fn create_repository(
        &self,
        project: &Project,
        name: &str,
        scm: ScmKind,
    ) -> VcsResult<Repository> {
        self.service
            .create_repository(&self.identity, project, name, scm)
            .await
    }

    pub async fn create_pull_request(&self, request: &CreatePullRequest) -> VcsResult<PullRequest> {
        self.service
            .create_pull_request(&self.identity, request)
            .await
    }

    pub async fn merge_pull_request(
        &self,
        pull_request: &PullRequest,
        auto_subject: bool,
    ) -> VcsResult<()> {
        self.service
            .merge_pull_request(&self.identity, pull_request, auto_subject)
            .await
    }

    pub async fn enable_hook(&self, repository: &Repository, hook_key: &str) -> VcsResult<()> {
        self.service
            .enable_hook(&self.identity, repository, hook_key)
            .await
    }

    pub async fn disable_hook(&self, repository: &Repository, hook_key: &str) -> VcsResult<()> {
        self.service
            .disable_hook(&self.identity, repository, hook_key)
            .await
    }
}
