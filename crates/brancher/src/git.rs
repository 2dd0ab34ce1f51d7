//! Subprocess git against a scratch working tree.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use crate::plan::{Base, PlannedBranch};

/// Refspec that mirrors every local branch to the remote.
pub const PUSH_REFSPEC: &str = "refs/heads/*:refs/heads/*";

/// Author and committer of every generated commit.
const AUTHOR: &str = "x";

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GitResult<T> = Result<T, GitError>;

/// A `git` invocation isolated from the user's and the system's config.
fn git_command(workdir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn run_git(workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(workdir).args(args).output()?;
    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Working tree the branches are generated in.
///
/// Either a temporary directory removed on drop, or a directory the caller
/// asked to keep.
pub struct ScratchRepo {
    path: PathBuf,
    _temp: Option<TempDir>,
}

impl ScratchRepo {
    /// Initialize an empty repository whose unborn `HEAD` is `master`.
    pub fn init(dir: Option<&Path>) -> GitResult<Self> {
        let (path, temp) = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| GitError::File {
                    path: dir.to_path_buf(),
                    source,
                })?;
                (dir.to_path_buf(), None)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("toolz-brancher-").tempdir()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        run_git(&path, &["init", "-q"])?;
        run_git(&path, &["symbolic-ref", "HEAD", "refs/heads/master"])?;

        Ok(Self { path, _temp: temp })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create `branch` from its base and give it one commit.
    ///
    /// The commit adds each of `files` under its base name. Without files it
    /// adds a single file named after the branch holding the branch name.
    pub fn commit_branch(&self, branch: &PlannedBranch, files: &[PathBuf]) -> GitResult<()> {
        if let Base::Branch(base) = &branch.base {
            run_git(&self.path, &["checkout", "-q", "-b", &branch.name, base])?;
        }

        if files.is_empty() {
            self.write(&branch.name, branch.name.as_bytes())?;
            run_git(&self.path, &["add", "--", &branch.name])?;
        } else {
            for file in files {
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| GitError::File {
                        path: file.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "not a file name",
                        ),
                    })?;
                let contents = std::fs::read(file).map_err(|source| GitError::File {
                    path: file.clone(),
                    source,
                })?;
                self.write(name, &contents)?;
                run_git(&self.path, &["add", "--", name])?;
            }
        }

        let name = format!("user.name={AUTHOR}");
        let email = format!("user.email={AUTHOR}");
        run_git(
            &self.path,
            &["-c", &name, "-c", &email, "commit", "-q", "-m", &branch.name],
        )?;
        Ok(())
    }

    /// Push every local branch to `url`.
    pub fn push(&self, url: &str) -> GitResult<()> {
        run_git(&self.path, &["push", "-q", url, PUSH_REFSPEC])?;
        Ok(())
    }

    /// Local branch names, sorted.
    pub fn branches(&self) -> GitResult<Vec<String>> {
        let output = run_git(
            &self.path,
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
        )?;
        let mut names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    fn write(&self, name: &str, contents: &[u8]) -> GitResult<()> {
        let path = self.path.join(name);
        std::fs::write(&path, contents).map_err(|source| GitError::File { path, source })
    }
}
