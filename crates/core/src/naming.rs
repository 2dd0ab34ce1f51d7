//! Naming convention for bulk-provisioned projects and repositories.
//!
//! Convention:
//!
//! - project key: `{prefix}-{suffix}{project_index}` where `suffix` is four
//!   random lowercase letters, recomputed per project;
//! - repository name: `{project_key}_{repository_index}`.
//!
//! Uniqueness of the random suffix is best effort; the service rejects
//! duplicate keys.

use rand::Rng;

/// Length of the random component of a project key.
pub const SUFFIX_LEN: usize = 4;

/// Build a project key from its parts.
///
/// ```
/// use toolz_core::naming::project_key;
///
/// assert_eq!(project_key("LOAD", "abcd", 7), "LOAD-abcd7");
/// ```
pub fn project_key(prefix: &str, suffix: &str, index: u32) -> String {
    format!("{prefix}-{suffix}{index}")
}

/// Build a repository name for the `index`-th repository of a project.
///
/// ```
/// use toolz_core::naming::repository_name;
///
/// assert_eq!(repository_name("LOAD-abcd7", 0), "LOAD-abcd7_0");
/// ```
pub fn repository_name(project_key: &str, index: u32) -> String {
    format!("{project_key}_{index}")
}

/// Draw [`SUFFIX_LEN`] random lowercase ASCII letters.
pub fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| rng.random_range('a'..='z'))
        .collect()
}
