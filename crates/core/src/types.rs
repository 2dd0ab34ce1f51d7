//! Descriptors for the resources managed on the remote VCS service.
//!
//! Field names follow the Bitbucket Server REST representation so the same
//! types deserialize both API responses and webhook payloads.

use serde::{Deserialize, Serialize};

/// Source-control kind of a repository. Only git is ever created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    Git,
}

impl ScmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScmKind::Git => "git",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: u64,
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scm_id: Option<String>,
    pub project: Project,
}

impl Repository {
    /// `PROJECT/slug`, used in log fields.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.project.key, self.slug)
    }
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequest {
    /// Fully qualified source ref, e.g. `refs/heads/pr-open-1`.
    pub from_ref: String,
    pub from_repository: Repository,
    pub to_repository: Repository,
    /// Target branch name without the `refs/heads/` prefix.
    pub to_branch: String,
    pub title: String,
}

/// A pull request as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    /// Optimistic-locking version required by the merge call.
    pub version: i32,
    pub title: String,
    pub from_ref: String,
    pub to_branch: String,
    pub repository: Repository,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_deserializes_from_service_json() {
        let repo: Repository = serde_json::from_value(serde_json::json!({
            "id": 11,
            "slug": "pr-load",
            "name": "PR-Load",
            "scmId": "git",
            "project": { "key": "LOAD", "id": 3, "name": "Load" },
        }))
        .unwrap();

        assert_eq!(repo.slug, "pr-load");
        assert_eq!(repo.scm_id.as_deref(), Some("git"));
        assert_eq!(repo.full_name(), "LOAD/pr-load");
    }

    #[test]
    fn repository_tolerates_minimal_payload() {
        let repo: Repository = serde_json::from_value(serde_json::json!({
            "slug": "r",
            "project": { "key": "P" },
        }))
        .unwrap();

        assert_eq!(repo.id, 0);
        assert!(repo.name.is_empty());
    }

    #[test]
    fn scm_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ScmKind::Git).unwrap(), "git");
        assert_eq!(ScmKind::Git.as_str(), "git");
    }
}
