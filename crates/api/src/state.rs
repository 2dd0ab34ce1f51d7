use std::sync::Arc;

use toolz_pipeline::ChangeRequestOrchestrator;
use toolz_vcs::memory::InMemoryVcs;
use toolz_vcs::rest::RestVcsClient;
use toolz_vcs::{VcsResult, VcsService};
use toolz_worker::{BoundedDispatcher, JobRegistry, LocalScheduler};

use crate::config::{ServerConfig, VcsBackendKind};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every component is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Remote service all jobs and ref tasks call into.
    pub vcs: Arc<dyn VcsService>,
    /// In-process scheduler backend the registry schedules on.
    pub scheduler: Arc<LocalScheduler>,
    /// One-shot jobs (bulk provisioning) awaiting their run.
    pub registry: Arc<JobRegistry>,
    /// Worker pool for ref-batch tasks.
    pub dispatcher: Arc<BoundedDispatcher>,
    pub orchestrator: Arc<ChangeRequestOrchestrator>,
}

impl AppState {
    /// Build the state for the configured VCS backend.
    ///
    /// Spawns the dispatcher workers, so it must run inside a Tokio runtime.
    pub fn from_config(config: ServerConfig) -> VcsResult<Self> {
        let vcs: Arc<dyn VcsService> = match config.vcs_backend {
            VcsBackendKind::Rest => Arc::new(RestVcsClient::new(
                config.vcs_base_url.clone(),
                config.vcs_request_timeout(),
            )?),
            VcsBackendKind::Memory => {
                tracing::warn!("Using the in-memory VCS backend, no remote calls are made");
                Arc::new(InMemoryVcs::new())
            }
        };
        Ok(Self::with_vcs(config, vcs))
    }

    /// Build the state around an existing VCS service.
    pub fn with_vcs(config: ServerConfig, vcs: Arc<dyn VcsService>) -> Self {
        let scheduler = Arc::new(LocalScheduler::new());
        let registry = JobRegistry::new(scheduler.clone(), config.system_user.clone());
        let dispatcher = Arc::new(BoundedDispatcher::new(config.dispatcher_pool_size));
        let orchestrator = Arc::new(
            ChangeRequestOrchestrator::new(
                Arc::clone(&vcs),
                Arc::clone(&dispatcher),
                config.system_user.clone(),
            )
            .with_hook_keys(config.hook_keys.clone()),
        );

        Self {
            config: Arc::new(config),
            vcs,
            scheduler,
            registry,
            dispatcher,
            orchestrator,
        }
    }

    /// Stop accepting background work and wait for what is queued or running.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
        self.registry.shutdown().await;
        self.scheduler.shutdown().await;
    }
}
