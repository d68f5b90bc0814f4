//! Branch and worktree topology analysis.
//!
//! Computes ahead/behind deltas for every local branch against a resolved
//! base ref, parses the porcelain worktree listing, and derives a fixed
//! priority list of coordination recommendations. Per-branch query
//! failures are skipped so one bad ref never sinks the whole report.

use crate::git::query::{GitQuery, DETACHED_HEAD};
use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

/// Conventional main-branch names tried, in order, during auto detection.
pub const BASE_CANDIDATES: [&str; 3] = ["main", "master", "trunk"];

/// Branch label for a worktree with a detached HEAD.
pub const DETACHED_LABEL: &str = "(detached)";

/// No usable base ref could be determined. Fatal for the invocation;
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("base branch/ref '{requested}' does not exist locally or as 'origin/{requested}'")]
    ExplicitMissing { requested: String },
    #[error("unable to detect a base branch/ref; pass one explicitly")]
    NoCandidate,
}

/// Ahead/behind counts for one branch against the base ref. Never the
/// base branch itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchDelta {
    pub branch: String,
    pub ahead_of_base: u64,
    pub behind_base: u64,
}

/// How a branch relates to the base ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCategory {
    Stale,
    Diverged,
    AheadOnly,
    InSync,
}

impl BranchCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stale => "stale: rebase before new work",
            Self::Diverged => "diverged: rebase before merge",
            Self::AheadOnly => "ahead only: candidate to merge",
            Self::InSync => "in sync with base",
        }
    }
}

/// Pure categorization of a delta.
pub fn categorize(delta: &BranchDelta) -> BranchCategory {
    match (delta.ahead_of_base, delta.behind_base) {
        (0, behind) if behind > 0 => BranchCategory::Stale,
        (ahead, behind) if ahead > 0 && behind > 0 => BranchCategory::Diverged,
        (ahead, 0) if ahead > 0 => BranchCategory::AheadOnly,
        _ => BranchCategory::InSync,
    }
}

/// One registered worktree. `dirty` is only ever computed for a non-empty
/// path; a vanished path degrades to "not dirty".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorktreeState {
    pub path: String,
    pub branch: String,
    pub detached: bool,
    pub prunable: bool,
    pub dirty: bool,
}

/// Full analyzer output for one invocation.
#[derive(Debug, Clone)]
pub struct TopologyReport {
    pub base_ref: String,
    pub repo_root_status: String,
    pub root_dirty: bool,
    pub branch_deltas: Vec<BranchDelta>,
    pub worktrees: Vec<WorktreeState>,
    pub recommendations: Vec<String>,
}

impl TopologyReport {
    /// Machine-mode document, one per invocation.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "base_ref": self.base_ref,
            "repo_root_status": self.repo_root_status,
            "branch_deltas": self.branch_deltas.iter().map(|d| {
                json!({
                    "branch": d.branch,
                    "ahead_of_base": d.ahead_of_base,
                    "behind_base": d.behind_base,
                    "category": categorize(d).label(),
                })
            }).collect::<Vec<_>>(),
            "worktrees": self.worktrees,
            "recommendations": self.recommendations,
        })
    }
}

/// Canonical, order-stable digest of the report used for change
/// detection. Fields are declared in their serialized (alphabetical)
/// order and every list is sorted, so two snapshots of unchanged state
/// compare and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    pub base_ref: String,
    pub dirty_worktrees: Vec<String>,
    pub diverged: Vec<String>,
    pub prunable_worktrees: Vec<String>,
    pub root_dirty: bool,
}

impl TopologySnapshot {
    pub fn from_report(report: &TopologyReport) -> Self {
        let mut dirty_worktrees: Vec<String> = report
            .worktrees
            .iter()
            .filter(|w| w.dirty)
            .map(|w| format!("{}@{}", w.branch, w.path))
            .collect();
        dirty_worktrees.sort();

        let mut prunable_worktrees: Vec<String> = report
            .worktrees
            .iter()
            .filter(|w| w.prunable)
            .map(|w| w.path.clone())
            .collect();
        prunable_worktrees.sort();

        let mut diverged: Vec<String> = report
            .branch_deltas
            .iter()
            .filter(|d| categorize(d) == BranchCategory::Diverged)
            .map(|d| d.branch.clone())
            .collect();
        diverged.sort();

        Self {
            base_ref: report.base_ref.clone(),
            dirty_worktrees,
            diverged,
            prunable_worktrees,
            root_dirty: report.root_dirty,
        }
    }
}

/// Strip the `origin/` qualifier so a remote base ref can be matched
/// against local branch names.
pub fn normalize_base_branch(base_ref: &str) -> &str {
    base_ref.strip_prefix("origin/").unwrap_or(base_ref)
}

/// Resolve the requested base ref, or auto-detect one.
///
/// Auto order: conventional names as local branches, the same names
/// remote-qualified, the remote's recorded symbolic default, the
/// currently checked-out branch (rejecting detached HEAD).
pub fn resolve_base_ref(
    git: &dyn GitQuery,
    requested: &str,
) -> Result<String, ResolutionError> {
    let requested = requested.trim();
    if !requested.is_empty() && !requested.eq_ignore_ascii_case("auto") {
        if git.ref_exists(requested) {
            return Ok(requested.to_string());
        }
        let remote_requested = format!("origin/{requested}");
        if git.ref_exists(&remote_requested) {
            return Ok(remote_requested);
        }
        return Err(ResolutionError::ExplicitMissing {
            requested: requested.to_string(),
        });
    }
    detect_base_ref(git)
}

fn detect_base_ref(git: &dyn GitQuery) -> Result<String, ResolutionError> {
    let branches = git.local_branches().unwrap_or_default();

    for candidate in BASE_CANDIDATES {
        if branches.iter().any(|b| b == candidate) {
            return Ok(candidate.to_string());
        }
    }

    for candidate in BASE_CANDIDATES {
        let remote_ref = format!("origin/{candidate}");
        if git.ref_exists(&remote_ref) {
            return Ok(remote_ref);
        }
    }

    if let Some(candidate) = git.remote_default("origin") {
        if git.ref_exists(&candidate) {
            return Ok(candidate);
        }
    }

    if let Some(current) = git.current_ref() {
        if !current.is_empty() && current != DETACHED_HEAD {
            return Ok(current);
        }
    }

    Err(ResolutionError::NoCandidate)
}

/// Ahead/behind deltas for every local branch except the normalized base.
///
/// A branch whose count query fails or returns malformed output is
/// skipped; partial results beat total failure. Sorted by
/// `(behind desc, ahead desc, name desc)` for reproducible output.
pub fn compute_branch_deltas(git: &dyn GitQuery, base_ref: &str) -> Result<Vec<BranchDelta>> {
    let base_branch = normalize_base_branch(base_ref);
    let mut deltas = Vec::new();

    for branch in git.local_branches()? {
        if branch == base_branch {
            continue;
        }
        match git.ahead_behind(&branch, base_ref) {
            Ok((ahead, behind)) => deltas.push(BranchDelta {
                branch,
                ahead_of_base: ahead,
                behind_base: behind,
            }),
            Err(err) => {
                tracing::debug!("skipping branch {branch}: {err:#}");
            }
        }
    }

    deltas.sort_by(|a, b| {
        b.behind_base
            .cmp(&a.behind_base)
            .then(b.ahead_of_base.cmp(&a.ahead_of_base))
            .then(b.branch.cmp(&a.branch))
    });
    Ok(deltas)
}

/// Split a porcelain worktree listing into attribute blocks. Attributes
/// without a value (e.g. `detached`) map to an empty string.
pub fn parse_worktree_listing(output: &str) -> Vec<HashMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        match line.split_once(' ') {
            Some((key, value)) => current.insert(key.to_string(), value.to_string()),
            None => current.insert(line.to_string(), String::new()),
        };
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Enumerate worktrees with branch label, prunable flag, and dirtiness.
pub fn collect_worktrees(git: &dyn GitQuery) -> Result<Vec<WorktreeState>> {
    let listing = git.worktree_listing()?;
    let mut states = Vec::new();

    for block in parse_worktree_listing(&listing) {
        let path = block.get("worktree").cloned().unwrap_or_default();
        let branch_ref = block.get("branch").cloned().unwrap_or_default();
        let detached = block.contains_key("detached");
        let prunable = block.contains_key("prunable");

        let branch = if let Some(name) = branch_ref.strip_prefix("refs/heads/") {
            name.to_string()
        } else if detached {
            DETACHED_LABEL.to_string()
        } else {
            branch_ref
        };

        let dirty = !path.is_empty() && git.worktree_dirty(Path::new(&path));
        states.push(WorktreeState {
            path,
            branch,
            detached,
            prunable,
            dirty,
        });
    }
    Ok(states)
}

const BRANCH_NAME_CAP: usize = 8;
const DIRTY_WORKTREE_CAP: usize = 6;
const WORKTREE_COUNT_CEILING: usize = 10;

/// Derive coordination advisories in fixed rule priority, independent of
/// input order. Name lists come from the already-sorted inputs.
pub fn build_recommendations(
    base_ref: &str,
    root_dirty: bool,
    deltas: &[BranchDelta],
    worktrees: &[WorktreeState],
) -> Vec<String> {
    let mut recs = Vec::new();

    if root_dirty {
        recs.push(
            "Repository root worktree has local changes. Commit or stash before coordinating merges."
                .to_string(),
        );
    }

    fn names_of(deltas: &[BranchDelta], category: BranchCategory) -> Vec<&str> {
        deltas
            .iter()
            .filter(|d| categorize(d) == category)
            .take(BRANCH_NAME_CAP)
            .map(|d| d.branch.as_str())
            .collect()
    }

    let diverged = names_of(deltas, BranchCategory::Diverged);
    if !diverged.is_empty() {
        recs.push(format!(
            "Rebase diverged branches onto {base_ref} before merge: {}.",
            diverged.join(", ")
        ));
    }

    let stale = names_of(deltas, BranchCategory::Stale);
    if !stale.is_empty() {
        recs.push(format!(
            "Rebase stale branches on top of {base_ref} before new commits: {}.",
            stale.join(", ")
        ));
    }

    let ahead_only = names_of(deltas, BranchCategory::AheadOnly);
    if !ahead_only.is_empty() {
        recs.push(format!(
            "Branches ahead of {base_ref} and not behind can be validated then merged/cherry-picked: {}.",
            ahead_only.join(", ")
        ));
    }

    let dirty: Vec<String> = worktrees
        .iter()
        .filter(|w| w.dirty)
        .take(DIRTY_WORKTREE_CAP)
        .map(|w| format!("{}@{}", w.branch, w.path))
        .collect();
    if !dirty.is_empty() {
        recs.push(format!(
            "Dirty worktrees detected. Stash or commit before branch switching: {}.",
            dirty.join(", ")
        ));
    }

    if worktrees.iter().any(|w| w.prunable) {
        recs.push(
            "Prunable worktrees exist. Run `git worktree prune` after validating no needed data."
                .to_string(),
        );
    }

    if worktrees.len() > WORKTREE_COUNT_CEILING {
        recs.push(
            "High worktree count. Reuse or prune worktrees before creating new ones to reduce coordination risk."
                .to_string(),
        );
    }

    if recs.is_empty() {
        recs.push(format!(
            "Topology looks clean. Continue with normal branch validation against {base_ref}."
        ));
    }

    recs
}

/// Run the full analyzer: resolve the base, compute deltas and worktree
/// state, derive recommendations. Base resolution failure is fatal for
/// the invocation; it surfaces as [`ResolutionError`] through the
/// returned error.
pub fn analyze(git: &dyn GitQuery, requested_base: &str) -> Result<TopologyReport> {
    let repo_root_status = git.root_status()?;
    let base_ref = resolve_base_ref(git, requested_base)?;
    // `status -sb` always leads with the branch line; anything after it
    // is a local change.
    let root_dirty = repo_root_status
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
        > 1;
    let branch_deltas = compute_branch_deltas(git, &base_ref)?;
    let worktrees = collect_worktrees(git)?;
    let recommendations = build_recommendations(&base_ref, root_dirty, &branch_deltas, &worktrees);

    Ok(TopologyReport {
        base_ref,
        repo_root_status,
        root_dirty,
        branch_deltas,
        worktrees,
        recommendations,
    })
}
