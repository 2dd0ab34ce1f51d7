//! Ref changes and the branch naming policy that drives pull requests.
//!
//! Branch display ids select the workflow:
//!
//! | Display id prefix | Intent | Target branch |
//! |-------------------|--------|---------------|
//! | `pr-open-`        | open   | `master`      |
//! | `pr-merge-`       | merge  | `x-<display id>` |
//!
//! The two tests are independent. A ref matching neither is ignored; a ref
//! matching both (only possible if the prefixes ever overlap) is processed
//! once per intent.

use serde::{Deserialize, Serialize};

pub const OPEN_PREFIX: &str = "pr-open-";
pub const MERGE_PREFIX: &str = "pr-merge-";

/// Branch that open-intent pull requests target.
pub const DEFAULT_TARGET_BRANCH: &str = "master";

/// Prefix of the branch a merge-intent pull request targets.
pub const MERGE_TARGET_PREFIX: &str = "x-";

/// Prefix (case-insensitive) of repository names that get the post-receive
/// hook enabled on creation.
pub const PR_REPOSITORY_PREFIX: &str = "pr-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    Branch,
    Tag,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Add,
    Update,
    Delete,
}

/// A ref as carried by a change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimalRef {
    /// Fully qualified id, e.g. `refs/heads/pr-open-1`.
    pub id: String,
    /// Short name, e.g. `pr-open-1`.
    pub display_id: String,
    #[serde(rename = "type")]
    pub ref_type: RefType,
}

impl MinimalRef {
    pub fn branch(display_id: impl Into<String>) -> Self {
        let display_id = display_id.into();
        Self {
            id: format!("refs/heads/{display_id}"),
            display_id,
            ref_type: RefType::Branch,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.ref_type == RefType::Branch
    }
}

/// One ref update inside a pushed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefChange {
    #[serde(rename = "ref")]
    pub reference: MinimalRef,
    #[serde(default)]
    pub from_hash: String,
    #[serde(default)]
    pub to_hash: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
}

/// What to do with a classified branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Open,
    Merge,
}

impl Intent {
    /// Branch the pull request for `display_id` should target.
    pub fn target_branch(&self, display_id: &str) -> String {
        match self {
            Intent::Open => DEFAULT_TARGET_BRANCH.to_string(),
            Intent::Merge => format!("{MERGE_TARGET_PREFIX}{display_id}"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Open => "open",
            Intent::Merge => "merge",
        }
    }
}

/// Branch refs of a batch split by intent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefPartition {
    pub opens: Vec<MinimalRef>,
    pub merges: Vec<MinimalRef>,
    /// Branch refs that matched neither prefix.
    pub ignored: usize,
    /// Non-branch refs that were dropped before classification.
    pub non_branch: usize,
}

/// Keep branch refs and classify them into open and merge sets.
pub fn partition(changes: &[RefChange]) -> RefPartition {
    let mut result = RefPartition::default();

    for change in changes {
        let reference = &change.reference;
        if !reference.is_branch() {
            result.non_branch += 1;
            continue;
        }

        let is_open = reference.display_id.starts_with(OPEN_PREFIX);
        let is_merge = reference.display_id.starts_with(MERGE_PREFIX);

        if is_open {
            result.opens.push(reference.clone());
        }
        if is_merge {
            result.merges.push(reference.clone());
        }
        if !is_open && !is_merge {
            result.ignored += 1;
        }
    }

    result
}

/// Whether a newly created repository should get the post-receive hook.
///
/// ```
/// use toolz_core::refs::is_pr_repository;
///
/// assert!(is_pr_repository("PR-123"));
/// assert!(!is_pr_repository("release-1"));
/// ```
pub fn is_pr_repository(name: &str) -> bool {
    name.to_lowercase().starts_with(PR_REPOSITORY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(reference: MinimalRef) -> RefChange {
        RefChange {
            reference,
            from_hash: "0000000000000000000000000000000000000000".into(),
            to_hash: "1111111111111111111111111111111111111111".into(),
            change_type: ChangeType::Add,
        }
    }

    #[test]
    fn classifies_by_prefix() {
        let changes = vec![
            change(MinimalRef::branch("pr-open-foo")),
            change(MinimalRef::branch("pr-merge-bar")),
            change(MinimalRef::branch("feature-x")),
        ];

        let parts = partition(&changes);

        assert_eq!(parts.opens, vec![MinimalRef::branch("pr-open-foo")]);
        assert_eq!(parts.merges, vec![MinimalRef::branch("pr-merge-bar")]);
        assert_eq!(parts.ignored, 1);
        assert_eq!(parts.non_branch, 0);
    }

    #[test]
    fn tags_are_dropped() {
        let tag = MinimalRef {
            id: "refs/tags/pr-open-1".into(),
            display_id: "pr-open-1".into(),
            ref_type: RefType::Tag,
        };

        let parts = partition(&[change(tag)]);

        assert!(parts.opens.is_empty());
        assert_eq!(parts.non_branch, 1);
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let parts = partition(&[change(MinimalRef::branch("PR-OPEN-1"))]);
        assert!(parts.opens.is_empty());
        assert_eq!(parts.ignored, 1);
    }

    #[test]
    fn target_branches() {
        assert_eq!(Intent::Open.target_branch("pr-open-foo"), "master");
        assert_eq!(
            Intent::Merge.target_branch("pr-merge-bar"),
            "x-pr-merge-bar"
        );
    }

    #[test]
    fn pr_repository_check_ignores_case() {
        assert!(is_pr_repository("pr-load"));
        assert!(is_pr_repository("Pr-Load"));
        assert!(!is_pr_repository("load-pr-1"));
    }

    #[test]
    fn ref_change_deserializes_from_webhook_json() {
        let change: RefChange = serde_json::from_value(serde_json::json!({
            "ref": {
                "id": "refs/heads/pr-open-1",
                "displayId": "pr-open-1",
                "type": "BRANCH",
            },
            "refId": "refs/heads/pr-open-1",
            "fromHash": "0000000000000000000000000000000000000000",
            "toHash": "a1b2c3",
            "type": "ADD",
        }))
        .unwrap();

        assert_eq!(change.reference.display_id, "pr-open-1");
        assert!(change.reference.is_branch());
        assert_eq!(change.change_type, ChangeType::Add);
    }

    #[test]
    fn unknown_ref_type_is_not_a_branch() {
        let reference: MinimalRef = serde_json::from_value(serde_json::json!({
            "id": "refs/notes/x",
            "displayId": "x",
            "type": "NOTE",
        }))
        .unwrap();

        assert_eq!(reference.ref_type, RefType::Other);
    }
}
