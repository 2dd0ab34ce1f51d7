//! REST client for a Bitbucket Server compatible VCS service.
//!
//! Wraps the `rest/api/1.0` endpoints used by toolz (project and repository
//! creation, pull request creation and merge, repository hook toggling)
//! using [`reqwest`]. Requests authenticate with the bearer token of the
//! identity they run as.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use toolz_core::identity::Identity;
use toolz_core::types::{CreatePullRequest, Project, PullRequest, Repository, ScmKind};

use crate::error::{VcsError, VcsResult};
use crate::service::VcsService;

/// Default timeout for a single REST call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for one VCS service instance.
pub struct RestVcsClient {
    client: reqwest::Client,
    base_url: String,
}

/// Subset of the pull request representation returned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestResponse {
    id: u64,
    version: i32,
    title: String,
    from_ref: RefResponse,
    to_ref: RefResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefResponse {
    id: String,
    #[serde(default)]
    display_id: Option<String>,
}

impl RestVcsClient {
    /// Create a client for the service at `base_url`, e.g.
    /// `http://bitbucket:7990`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VcsResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/1.0{}", self.base_url, path)
    }

    fn repository_path(repository: &Repository) -> String {
        format!(
            "/projects/{}/repos/{}",
            repository.project.key, repository.slug
        )
    }

    fn hook_path(repository: &Repository, hook_key: &str) -> String {
        format!(
            "{}/settings/hooks/{}/enabled",
            Self::repository_path(repository),
            hook_key
        )
    }

    /// Start a request that runs as `as_user`.
    fn request(
        &self,
        method: reqwest::Method,
        url: String,
        as_user: &Identity,
    ) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("X-Atlassian-Token", "no-check");

        match as_user.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, returning a
    /// [`VcsError::Api`] with the status and body text otherwise.
    async fn ensure_success(response: reqwest::Response) -> VcsResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VcsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> VcsResult<T> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> VcsResult<()> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// JSON reference to a repository as used inside pull request bodies.
fn repository_ref(repository: &Repository) -> serde_json::Value {
    json!({
        "slug": repository.slug,
        "project": { "key": repository.project.key },
    })
}

/// Build the JSON body for pull request creation.
fn pull_request_body(request: &CreatePullRequest) -> serde_json::Value {
    json!({
        "title": request.title,
        "fromRef": {
            "id": request.from_ref,
            "repository": repository_ref(&request.from_repository),
        },
        "toRef": {
            "id": format!("refs/heads/{}", request.to_branch),
            "repository": repository_ref(&request.to_repository),
        },
    })
}

/// Strip `refs/heads/` from a ref id.
fn branch_name(ref_id: &str) -> &str {
    ref_id.strip_prefix("refs/heads/").unwrap_or(ref_id)
}

#[async_trait]
impl VcsService for RestVcsClient {
    async fn create_project(
        &self,
        as_user: &Identity,
        key: &str,
        name: &str,
    ) -> VcsResult<Project> {
        let response = self
            .request(reqwest::Method::POST, self.api_url("/projects"), as_user)
            .json(&json!({ "key": key, "name": name }))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn create_repository(
        &self,
        as_user: &Identity,
        project: &Project,
        name: &str,
        scm: ScmKind,
    ) -> VcsResult<Repository> {
        let url = self.api_url(&format!("/projects/{}/repos", project.key));
        let response = self
            .request(reqwest::Method::POST, url, as_user)
            .json(&json!({ "name": name, "scmId": scm.as_str() }))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn create_pull_request(
        &self,
        as_user: &Identity,
        request: &CreatePullRequest,
    ) -> VcsResult<PullRequest> {
        let url = self.api_url(&format!(
            "{}/pull-requests",
            Self::repository_path(&request.to_repository)
        ));
        let response = self
            .request(reqwest::Method::POST, url, as_user)
            .json(&pull_request_body(request))
            .send()
            .await?;

        let created: PullRequestResponse = Self::parse_response(response).await?;
        let to_branch = created
            .to_ref
            .display_id
            .unwrap_or_else(|| branch_name(&created.to_ref.id).to_string());

        Ok(PullRequest {
            id: created.id,
            version: created.version,
            title: created.title,
            from_ref: created.from_ref.id,
            to_branch,
            repository: request.to_repository.clone(),
        })
    }

    async fn merge_pull_request(
        &self,
        as_user: &Identity,
        pull_request: &PullRequest,
        auto_subject: bool,
    ) -> VcsResult<()> {
        let url = self.api_url(&format!(
            "{}/pull-requests/{}/merge?version={}",
            Self::repository_path(&pull_request.repository),
            pull_request.id,
            pull_request.version
        ));
        let body = if auto_subject {
            json!({})
        } else {
            json!({ "message": pull_request.title })
        };

        let response = self
            .request(reqwest::Method::POST, url, as_user)
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn enable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()> {
        let url = self.api_url(&Self::hook_path(repository, hook_key));
        let response = self
            .request(reqwest::Method::PUT, url, as_user)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn disable_hook(
        &self,
        as_user: &Identity,
        repository: &Repository,
        hook_key: &str,
    ) -> VcsResult<()> {
        let url = self.api_url(&Self::hook_path(repository, hook_key));
        let response = self
            .request(reqwest::Method::DELETE, url, as_user)
            .send()
            .await?;

        Self::check_status(response).await
    }
}
