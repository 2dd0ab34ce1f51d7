//! In-process [`VcsService`] that records every call.
//!
//! Used for dry runs (`VCS_BACKEND=memory`) and as the collaborator in tests.
//! Behaves like the real service where it matters to callers: duplicate
//! project keys and repository names are rejected, unknown pull requests
//! cannot be merged, and chosen names can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use toolz_core::identity::Identity;
use toolz_core::types::{CreatePullRequest, Project, PullRequest, Repository, ScmKind};

use crate::error::{VcsError, VcsResult};
use crate::service::VcsService;

/// One recorded call, in the order it reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    CreateProject {
        user_id: u64,
        key: String,
        name: String,
    },
    CreateRepository {
        user_id: u64,
        project_key: String,
        name: String,
        scm: ScmKind,
    },
    CreatePullRequest {
        user_id: u64,
        from_ref: String,
        to_branch: String,
        title: String,
    },
    MergePullRequest {
        user_id: u64,
        pull_request_id: u64,
        title: String,
        auto_subject: bool,
    },
    EnableHook {
        user_id: u64,
        repository: String,
        hook_key: String,
    },
    DisableHook {
        user_id: u64,
        repository: String,
        hook_key: String,
    },
}

impl VcsCall {
    pub fn user_id(&self) -> u64 {
        match self {
            VcsCall::CreateProject { user_id, .. }
            | VcsCall::CreateRepository { user_id, .. }
            | VcsCall::CreatePullRequest { user_id, .. }
            | VcsCall::MergePullRequest { user_id, .. }
            | VcsCall::EnableHook { user_id, .. }
            | VcsCall::DisableHook { user_id, .. } => *user_id,
        }
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    calls: Vec<VcsCall>,
    projects: HashMap<String, Project>,
    repositories: HashSet<String>,
    open_pull_requests: HashSet<u64>,
    hooks: HashMap<(String, String), bool>,
    failing_names: HashSet<String>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_failure(&self, name: &str) -> VcsResult<()> {
        if self.failing_names.contains(name) {
            return Err(VcsError::Rejected(format!("injected failure for {name}")));
        }
        Ok(())
    }
}

/// Recording in-memory VCS backend.
#[derive(Default)]
pub struct InMemoryVcs {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl InMemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` to mimic network round trips.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make any later call naming `name` (project key, repository name,
    /// pull request title, or hook key) fail with [`VcsError::Rejected`].
    pub fn fail_on(&self, name: impl Into<String>) {
        self.lock().failing_names.insert(name.into());
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<VcsCall> {
        self.lock().calls.clone()
    }

    /// Whether `hook_key` is enabled on `repository`, if it was ever toggled.
    pub fn hook_state(&self, repository: &Repository, hook_key: &str) -> Option<bool> {
        self.lock()
            .hooks
            .get(&(repository.full_name(), hook_key.to_string()))
            .copied()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn toggle_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
        enabled: bool,
    ) -> VcsResult<()> {
        let mut state = self.lock();
        let call = if enabled {
            VcsCall::EnableHook {
                user_id: as_user.user_id,
                repository: repository.full_name(),
                hook_key: hook_key.to_string(),
            }
        } else {
            VcsCall::DisableHook {
                user_id: as_user.user_id,
                repository: repository.full_name(),
                hook_key: hook_key.to_string(),
            }
        };
        state.calls.push(call);
        state.check_failure(hook_key)?;
        state
            .hooks
            .insert((repository.full_name(), hook_key.to_string()), enabled);
        Ok(())
    }
}

#[async_trait]
impl VcsService for InMemoryVcs {
    async fn create_project(
        &self,
        as_user: &Identity,
        key: &str,
        name: &str,
    ) -> VcsResult<Project> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.calls.push(VcsCall::CreateProject {
            user_id: as_user.user_id,
            key: key.to_string(),
            name: name.to_string(),
        });
        state.check_failure(key)?;
        if state.projects.contains_key(key) {
            return Err(VcsError::Rejected(format!("project key {key} is taken")));
        }

        let project = Project {
            id: state.allocate_id(),
            key: key.to_string(),
            name: name.to_string(),
        };
        state.projects.insert(key.to_string(), project.clone());
        Ok(project)
    }

    async fn create_repository(
        &self,
        as_user: &Identity,
        project: &Project,
        name: &str,
        scm: ScmKind,
    ) -> VcsResult<Repository> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.calls.push(VcsCall::CreateRepository {
            user_id: as_user.user_id,
            project_key: project.key.clone(),
            name: name.to_string(),
            scm,
        });
        state.check_failure(name)?;
        if !state.projects.contains_key(&project.key) {
            return Err(VcsError::Rejected(format!(
                "project {} does not exist",
                project.key
            )));
        }

        let slug = name.to_lowercase();
        let full_name = format!("{}/{}", project.key, slug);
        if !state.repositories.insert(full_name) {
            return Err(VcsError::Rejected(format!(
                "repository {name} already exists in {}",
                project.key
            )));
        }

        Ok(Repository {
            id: state.allocate_id(),
            slug,
            name: name.to_string(),
            scm_id: Some(scm.as_str().to_string()),
            project: project.clone(),
        })
    }

    async fn create_pull_request(
        &self,
        as_user: &Identity,
        request: &CreatePullRequest,
    ) -> VcsResult<PullRequest> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.calls.push(VcsCall::CreatePullRequest {
            user_id: as_user.user_id,
            from_ref: request.from_ref.clone(),
            to_branch: request.to_branch.clone(),
            title: request.title.clone(),
        });
        state.check_failure(&request.title)?;

        let id = state.allocate_id();
        state.open_pull_requests.insert(id);
        Ok(PullRequest {
            id,
            version: 0,
            title: request.title.clone(),
            from_ref: request.from_ref.clone(),
            to_branch: request.to_branch.clone(),
            repository: request.to_repository.clone(),
        })
    }

    async fn merge_pull_request(
        &self,
        as_user: &Identity,
        pull_request: &PullRequest,
        auto_subject: bool,
    ) -> VcsResult<()> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.calls.push(VcsCall::MergePullRequest {
            user_id: as_user.user_id,
            pull_request_id: pull_request.id,
            title: pull_request.title.clone(),
            auto_subject,
        });
        if !state.open_pull_requests.remove(&pull_request.id) {
            return Err(VcsError::Rejected(format!(
                "pull request {} is not open",
                pull_request.id
            )));
        }
        Ok(())
    }

    async fn enable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()> {
        self.simulate_latency().await;
        self.toggle_hook(as_user, repository, hook_key, true)
    }

    async fn disable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()> {
        self.simulate_latency().await;
        self.toggle_hook(as_user, repository, hook_key, false)
    }
}
