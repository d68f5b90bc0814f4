//! Read-only query interface over the version-control system.
//!
//! The analyzer never shells out directly; everything it needs from git
//! goes through [`GitQuery`], so tests can substitute an in-memory fake
//! and the engine carries zero coupling to how refs are obtained.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Sentinel `git rev-parse --abbrev-ref HEAD` prints when HEAD is detached.
pub const DETACHED_HEAD: &str = "HEAD";

/// Queries the topology analyzer needs. All calls are synchronous and
/// bounded: one round trip each, no retries.
pub trait GitQuery {
    /// Whether `name` resolves to a commit.
    fn ref_exists(&self, name: &str) -> bool;

    /// Unique local branch names, sorted.
    fn local_branches(&self) -> Result<Vec<String>>;

    /// Symmetric commit counts: reachable from `branch` but not `base`,
    /// and vice versa. Errors on malformed count output so the caller can
    /// skip the branch instead of aborting the whole pass.
    fn ahead_behind(&self, branch: &str, base: &str) -> Result<(u64, u64)>;

    /// The remote's recorded symbolic default branch (e.g. `origin/main`).
    fn remote_default(&self, remote: &str) -> Option<String>;

    /// Currently checked-out branch name; [`DETACHED_HEAD`] when detached.
    fn current_ref(&self) -> Option<String>;

    /// Raw porcelain worktree listing: blank-line-delimited attribute blocks.
    fn worktree_listing(&self) -> Result<String>;

    /// Whether the worktree at `path` has uncommitted changes. An
    /// inaccessible path fails open to `false`.
    fn worktree_dirty(&self, path: &Path) -> bool;

    /// Short branch-and-status text for the root worktree.
    fn root_status(&self) -> Result<String>;
}

/// [`GitQuery`] backed by the `git` CLI.
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        run_git(&self.repo_root, args)
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .with_context(|| format!("failed to spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl GitQuery for GitCli {
    fn ref_exists(&self, name: &str) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["rev-parse", "--verify", "--quiet", name])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        let mut branches: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        branches.sort();
        branches.dedup();
        Ok(branches)
    }

    fn ahead_behind(&self, branch: &str, base: &str) -> Result<(u64, u64)> {
        let range = format!("{branch}...{base}");
        let out = self.run(&["rev-list", "--left-right", "--count", &range])?;
        let mut parts = out.split_whitespace();
        let (Some(ahead), Some(behind), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("malformed rev-list count output: {out:?}");
        };
        let ahead = ahead
            .parse::<u64>()
            .with_context(|| format!("malformed ahead count: {ahead:?}"))?;
        let behind = behind
            .parse::<u64>()
            .with_context(|| format!("malformed behind count: {behind:?}"))?;
        Ok((ahead, behind))
    }

    fn remote_default(&self, remote: &str) -> Option<String> {
        let ref_name = format!("refs/remotes/{remote}/HEAD");
        let out = self
            .run(&["symbolic-ref", "--quiet", &ref_name])
            .ok()?;
        out.strip_prefix("refs/remotes/").map(str::to_string)
    }

    fn current_ref(&self) -> Option<String> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).ok()?;
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn worktree_listing(&self) -> Result<String> {
        self.run(&["worktree", "list", "--porcelain"])
    }

    fn worktree_dirty(&self, path: &Path) -> bool {
        run_git(path, &["status", "--porcelain"])
            .map(|out| !out.is_empty())
            .unwrap_or(false)
    }

    fn root_status(&self) -> Result<String> {
        self.run(&["status", "-sb"])
    }
}
