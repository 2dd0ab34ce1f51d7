//! Generates a fixture repository with `pr-open-*` and `pr-merge-*`
//! branches and optionally pushes it, to drive the post-receive pipeline.

mod git;
mod plan;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use toolz_core::timing::Stopwatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::git::ScratchRepo;
use crate::plan::{plan_branches, Base};

#[derive(Parser, Debug)]
#[command(
    name = "toolz-brancher",
    version,
    about = "Create pr-open-* and pr-merge-* branches and push them in one go"
)]
struct Args {
    /// Number of pr-open-<i> branches, each one commit ahead of master.
    open: u32,

    /// Number of pr-merge-<i> branches, each one commit ahead of its own
    /// x-pr-merge-<i> target.
    merge: u32,

    /// File committed to master under its base name. Repeatable.
    #[arg(short = 'f', long = "file")]
    files: Vec<PathBuf>,

    /// Remote URL to push every branch to.
    #[arg(short = 'p', long = "push")]
    push: Option<String>,

    /// Build the repository here and keep it, instead of a temp directory.
    #[arg(long)]
    dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolz_brancher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let repo = ScratchRepo::init(args.dir.as_deref()).context("initializing repository")?;
    tracing::info!(path = %repo.path().display(), "Repository initialized");

    let plan = plan_branches(args.open, args.merge);
    let (root, rest) = plan
        .split_first()
        .context("branch plan has no root branch")?;
    debug_assert_eq!(root.base, Base::Root);

    repo.commit_branch(root, &args.files)
        .with_context(|| format!("committing {}", root.name))?;

    let open = args.open as usize;
    let (opens, merges) = rest.split_at(open);

    let timer = Stopwatch::start();
    for branch in opens {
        repo.commit_branch(branch, &[])
            .with_context(|| format!("creating {}", branch.name))?;
    }
    tracing::info!(
        count = args.open,
        elapsed_ms = %timer.elapsed_ms(),
        "Created open branches",
    );

    let timer = Stopwatch::start();
    for branch in merges {
        repo.commit_branch(branch, &[])
            .with_context(|| format!("creating {}", branch.name))?;
    }
    tracing::info!(
        count = args.merge,
        elapsed_ms = %timer.elapsed_ms(),
        "Created merge branches",
    );

    if let Some(url) = &args.push {
        let timer = Stopwatch::start();
        repo.push(url).with_context(|| format!("pushing to {url}"))?;
        tracing::info!(
            open = args.open,
            merge = args.merge,
            branches = plan.len(),
            elapsed_ms = %timer.elapsed_ms(),
            "Pushed branches",
        );
    }

    Ok(())
}
