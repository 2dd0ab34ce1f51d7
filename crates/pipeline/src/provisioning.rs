//! Bulk creation of projects and repositories.
//!
//! For each of `projects` projects a key `{prefix}-{suffix}{index}` is
//! derived (see [`toolz_core::naming`]), the project is created, and then
//! `repositories_per_project` git repositories named `{key}_{index}` are
//! created inside it. Everything runs sequentially on the task that claimed
//! the job. The first failing call aborts the run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use toolz_core::identity::Identity;
use toolz_core::naming;
use toolz_core::timing::{format_millis, Stopwatch};
use toolz_core::types::ScmKind;
use toolz_vcs::{impersonate, VcsResult, VcsService};
use toolz_worker::{Job, JobError};

/// Semantic id of the provisioning job.
pub const JOB_ID: &str = "repository-factory";

/// Source of the random component of each project key.
pub type SuffixSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Totals of a finished provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub projects: u32,
    pub repositories: u64,
    pub repositories_per_project: u32,
    pub elapsed: Duration,
}

pub struct BulkProvisioningJob {
    service: Arc<dyn VcsService>,
    prefix: String,
    repositories_per_project: u32,
    projects: u32,
    suffix: SuffixSource,
}

impl BulkProvisioningJob {
    pub fn new(
        service: Arc<dyn VcsService>,
        prefix: impl Into<String>,
        repositories_per_project: u32,
        projects: u32,
    ) -> Self {
        Self {
            service,
            prefix: prefix.into(),
            repositories_per_project,
            projects,
            suffix: Arc::new(naming::random_suffix),
        }
    }

    /// Replace the random key suffix, e.g. with a constant in tests.
    pub fn with_suffix_source(mut self, suffix: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.suffix = Arc::new(suffix);
        self
    }

    /// Number of repositories a complete run creates.
    pub fn expected_repositories(&self) -> u64 {
        u64::from(self.projects) * u64::from(self.repositories_per_project)
    }

    /// Create every project and repository as `identity`.
    pub async fn provision(&self, identity: &Identity) -> VcsResult<ProvisioningReport> {
        let session = impersonate(Arc::clone(&self.service), identity.clone());
        let expected = self.expected_repositories();
        let mut created: u64 = 0;
        let total = Stopwatch::start();

        for project_index in 0..self.projects {
            let key = naming::project_key(&self.prefix, &(self.suffix)(), project_index);
            let project = session.create_project(&key, &key).await?;

            tracing::info!(
                current = project_index + 1,
                total = self.projects,
                project = %project.key,
                "Project created",
            );

            let project_timer = Stopwatch::start();
            for repository_index in 0..self.repositories_per_project {
                let repository_timer = Stopwatch::start();
                let name = naming::repository_name(&key, repository_index);

                session
                    .create_repository(&project, &name, ScmKind::Git)
                    .await?;
                created += 1;

                tracing::info!(
                    created,
                    expected,
                    repository = %name,
                    elapsed_ms = %repository_timer.elapsed_ms(),
                    "Repository created",
                );
            }

            tracing::info!(
                current = project_index + 1,
                total = self.projects,
                repositories = self.repositories_per_project,
                elapsed_ms = %project_timer.elapsed_ms(),
                "Project completed",
            );
        }

        let report = ProvisioningReport {
            projects: self.projects,
            repositories: created,
            repositories_per_project: self.repositories_per_project,
            elapsed: total.elapsed(),
        };

        tracing::info!(
            projects = report.projects,
            repositories = report.repositories,
            repositories_per_project = report.repositories_per_project,
            elapsed_ms = %format_millis(report.elapsed),
            "Provisioning complete",
        );

        Ok(report)
    }
}

impl fmt::Debug for BulkProvisioningJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkProvisioningJob")
            .field("prefix", &self.prefix)
            .field("repositories_per_project", &self.repositories_per_project)
            .field("projects", &self.projects)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Job for BulkProvisioningJob {
    fn id(&self) -> &str {
        JOB_ID
    }

    async fn run(&self, identity: &Identity) -> Result<(), JobError> {
        self.provision(identity)
            .await
            .map(|_| ())
            .map_err(JobError::from_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use toolz_vcs::memory::{InMemoryVcs, VcsCall};
    use toolz_vcs::VcsError;
    use toolz_worker::{JobRegistry, LocalScheduler};

    fn admin() -> Identity {
        Identity::new(1, "admin")
    }

    fn job(vcs: &Arc<InMemoryVcs>, repositories: u32, projects: u32) -> BulkProvisioningJob {
        BulkProvisioningJob::new(vcs.clone(), "LOAD", repositories, projects)
            .with_suffix_source(|| "abcd".to_string())
    }

    fn project_keys(calls: &[VcsCall]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                VcsCall::CreateProject { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    fn repository_names(calls: &[VcsCall]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                VcsCall::CreateRepository { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn two_repositories_in_three_projects() {
        let vcs = Arc::new(InMemoryVcs::new());

        let report = job(&vcs, 2, 3).provision(&admin()).await.unwrap();

        assert_eq!(report.projects, 3);
        assert_eq!(report.repositories, 6);
        assert_eq!(report.repositories_per_project, 2);

        let calls = vcs.calls();
        assert_eq!(
            project_keys(&calls),
            vec!["LOAD-abcd0", "LOAD-abcd1", "LOAD-abcd2"]
        );
        assert_eq!(
            repository_names(&calls),
            vec![
                "LOAD-abcd0_0",
                "LOAD-abcd0_1",
                "LOAD-abcd1_0",
                "LOAD-abcd1_1",
                "LOAD-abcd2_0",
                "LOAD-abcd2_1",
            ]
        );
    }

    #[tokio::test]
    async fn repositories_follow_their_project() {
        let vcs = Arc::new(InMemoryVcs::new());

        job(&vcs, 1, 2).provision(&admin()).await.unwrap();

        let calls = vcs.calls();
        assert_matches!(&calls[0], VcsCall::CreateProject { key, .. } if key == "LOAD-abcd0");
        assert_matches!(
            &calls[1],
            VcsCall::CreateRepository { project_key, scm: ScmKind::Git, .. } if project_key == "LOAD-abcd0"
        );
        assert_matches!(&calls[2], VcsCall::CreateProject { key, .. } if key == "LOAD-abcd1");
        assert_matches!(
            &calls[3],
            VcsCall::CreateRepository { project_key, .. } if project_key == "LOAD-abcd1"
        );
    }

    #[tokio::test]
    async fn project_name_equals_key() {
        let vcs = Arc::new(InMemoryVcs::new());

        job(&vcs, 0, 1).provision(&admin()).await.unwrap();

        assert_matches!(
            &vcs.calls()[0],
            VcsCall::CreateProject { key, name, .. } if key == name
        );
    }

    #[tokio::test]
    async fn zero_projects_makes_no_calls() {
        let vcs = Arc::new(InMemoryVcs::new());

        let report = job(&vcs, 5, 0).provision(&admin()).await.unwrap();

        assert_eq!(report.repositories, 0);
        assert!(vcs.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_repositories_only_creates_projects() {
        let vcs = Arc::new(InMemoryVcs::new());

        let report = job(&vcs, 0, 4).provision(&admin()).await.unwrap();

        let calls = vcs.calls();
        assert_eq!(report.repositories, 0);
        assert_eq!(project_keys(&calls).len(), 4);
        assert!(repository_names(&calls).is_empty());
    }

    #[tokio::test]
    async fn every_call_runs_as_the_given_identity() {
        let vcs = Arc::new(InMemoryVcs::new());

        job(&vcs, 2, 2).provision(&Identity::new(7, "loader")).await.unwrap();

        assert!(vcs.calls().iter().all(|c| c.user_id() == 7));
    }

    #[tokio::test]
    async fn default_suffix_is_four_lowercase_letters() {
        let vcs = Arc::new(InMemoryVcs::new());

        BulkProvisioningJob::new(vcs.clone(), "LOAD", 0, 1)
            .provision(&admin())
            .await
            .unwrap();

        let key = &project_keys(&vcs.calls())[0];
        let suffix = key
            .strip_prefix("LOAD-")
            .and_then(|rest| rest.strip_suffix('0'))
            .unwrap();
        assert_eq!(suffix.len(), naming::SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn failing_project_aborts_the_run() {
        let vcs = Arc::new(InMemoryVcs::new());
        vcs.fail_on("LOAD-abcd1");

        let result = job(&vcs, 2, 3).provision(&admin()).await;

        assert_matches!(result, Err(VcsError::Rejected(_)));
        let calls = vcs.calls();
        // project 0 with its two repositories, then the failing project 1
        assert_eq!(calls.len(), 4);
        assert_eq!(project_keys(&calls), vec!["LOAD-abcd0", "LOAD-abcd1"]);
    }

    #[tokio::test]
    async fn colliding_suffix_surfaces_as_failure() {
        let vcs = Arc::new(InMemoryVcs::new());
        job(&vcs, 0, 1).provision(&admin()).await.unwrap();

        let second = job(&vcs, 0, 1).provision(&admin()).await;

        assert_matches!(second, Err(VcsError::Rejected(_)));
    }

    #[tokio::test]
    async fn runs_once_through_the_registry() {
        let vcs = Arc::new(InMemoryVcs::new());
        let scheduler = Arc::new(LocalScheduler::new());
        let registry = JobRegistry::new(scheduler.clone(), admin());

        let id = registry.register(Arc::new(job(&vcs, 2, 3))).await.unwrap();
        scheduler.shutdown().await;

        assert_eq!(id.semantic_id(), JOB_ID);
        assert_eq!(vcs.calls().len(), 3 + 6);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failure_becomes_the_job_cause() {
        let vcs = Arc::new(InMemoryVcs::new());
        vcs.fail_on("LOAD-abcd0_1");
        let job: Arc<dyn Job> = Arc::new(job(&vcs, 2, 1));

        let err = job.run(&admin()).await.unwrap_err();

        assert_matches!(err, JobError::Source(_));
        assert!(err.to_string().contains("LOAD-abcd0_1"));
    }
}
