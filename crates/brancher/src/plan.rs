//! Which branches a fixture repository gets, and what each is based on.

use toolz_core::refs::{DEFAULT_TARGET_BRANCH, MERGE_PREFIX, MERGE_TARGET_PREFIX, OPEN_PREFIX};

/// Starting point of a planned branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// First commit of the repository.
    Root,
    Branch(String),
}

/// One branch to create, with exactly one commit of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBranch {
    pub name: String,
    pub base: Base,
}

impl PlannedBranch {
    fn on(name: String, base: &str) -> Self {
        Self {
            name,
            base: Base::Branch(base.to_string()),
        }
    }
}

/// Plan `master`, then `open` open branches off master, then `merge` pairs
/// of merge target (off master) and merge source (off its target).
///
/// Creation order is the order of the returned list.
pub fn plan_branches(open: u32, merge: u32) -> Vec<PlannedBranch> {
    let mut plan = Vec::with_capacity(1 + open as usize + 2 * merge as usize);
    plan.push(PlannedBranch {
        name: DEFAULT_TARGET_BRANCH.to_string(),
        base: Base::Root,
    });

    for i in 0..open {
        plan.push(PlannedBranch::on(
            format!("{OPEN_PREFIX}{i}"),
            DEFAULT_TARGET_BRANCH,
        ));
    }

    for i in 0..merge {
        let source = format!("{MERGE_PREFIX}{i}");
        let target = format!("{MERGE_TARGET_PREFIX}{source}");
        plan.push(PlannedBranch::on(target.clone(), DEFAULT_TARGET_BRANCH));
        plan.push(PlannedBranch::on(source, &target));
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(plan: &[PlannedBranch]) -> Vec<&str> {
        plan.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn empty_plan_is_just_master() {
        let plan = plan_branches(0, 0);
        assert_eq!(
            plan,
            vec![PlannedBranch {
                name: "master".into(),
                base: Base::Root,
            }]
        );
    }

    #[test]
    fn open_branches_start_from_master() {
        let plan = plan_branches(2, 0);

        assert_eq!(names(&plan), vec!["master", "pr-open-0", "pr-open-1"]);
        assert!(plan[1..]
            .iter()
            .all(|b| b.base == Base::Branch("master".into())));
    }

    #[test]
    fn merge_source_sits_on_its_target() {
        let plan = plan_branches(1, 2);

        assert_eq!(
            names(&plan),
            vec![
                "master",
                "pr-open-0",
                "x-pr-merge-0",
                "pr-merge-0",
                "x-pr-merge-1",
                "pr-merge-1",
            ]
        );
        assert_eq!(plan[2].base, Base::Branch("master".into()));
        assert_eq!(plan[3].base, Base::Branch("x-pr-merge-0".into()));
    }

    #[test]
    fn plan_size_matches_counts() {
        assert_eq!(plan_branches(40, 35).len(), 1 + 40 + 2 * 35);
    }
}
