use std::path::PathBuf;

use log::debug;

use crate::{process, Result};

/// The revision history queries the change resolution needs.
///
/// The `bool` answers are expected outcomes, not failures: an unknown revision or unrelated
/// histories are normal in CI after force pushes or shallow clones. `Err` is reserved for the
/// query itself failing.
pub trait RevisionHistory {
    /// Returns true if `rev` names a commit.
    fn commit_exists(&self, rev: &str) -> Result<bool>;

    /// Returns true if `base` and `head` have a common ancestor.
    fn has_merge_base(&self, base: &str, head: &str) -> Result<bool>;

    /// Returns the repo-relative paths of the files that differ between `base` and `head`.
    fn changed_paths(&self, base: &str, head: &str) -> Result<Vec<String>>;
}

/// [`RevisionHistory`] backed by the `git` command line, run inside the repository root.
#[derive(Debug, Clone)]
pub struct Git {
    repo_root: PathBuf,
}

impl Git {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn succeeds(&self, command: process::Command) -> Result<bool> {
        Ok(command
            .current_dir(&self.repo_root)
            .try_status_quiet()?
            .success())
    }
}

impl RevisionHistory for Git {
    fn commit_exists(&self, rev: &str) -> Result<bool> {
        let exists = self.succeeds(process::command!(
            "git",
            "rev-parse",
            "--verify",
            "--quiet",
            format!("{rev}^{{commit}}"),
        ))?;
        debug!("git commit {rev:?} exists: {exists}");
        Ok(exists)
    }

    fn has_merge_base(&self, base: &str, head: &str) -> Result<bool> {
        let has_merge_base = self.succeeds(process::command!("git", "merge-base", base, head))?;
        debug!("git merge base of {base:?} and {head:?} exists: {has_merge_base}");
        Ok(has_merge_base)
    }

    fn changed_paths(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let output = process::command!("git", "diff", "--name-only", format!("{base}..{head}"))
            .current_dir(&self.repo_root)
            .output()?;
        Ok(parse_name_only(&output.stdout_lossy()))
    }
}

fn parse_name_only(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}
