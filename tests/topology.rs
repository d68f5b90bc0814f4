//! Topology analyzer tests against real throwaway git repositories.

use shepherd::git::{analyze, categorize, BranchCategory, GitCli, TopologySnapshot};
use std::path::Path;
use std::process::Command;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    // pin the unborn branch name; `git init` defaults vary by version
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
}

fn commit(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), name).unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", name]);
}

#[test]
fn analyze_categorizes_branches_and_sorts_deterministically() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit(dir, "m1.txt");

    // no commits of its own, left behind by main
    git(dir, &["branch", "stale-br"]);
    // one commit of its own, also left behind by main
    git(dir, &["checkout", "-q", "-b", "diverged-br"]);
    commit(dir, "d1.txt");
    git(dir, &["checkout", "-q", "main"]);
    commit(dir, "m2.txt");
    // one commit past the tip of main
    git(dir, &["checkout", "-q", "-b", "ahead-br"]);
    commit(dir, "a1.txt");
    git(dir, &["checkout", "-q", "main"]);
    git(dir, &["branch", "insync-br"]);

    let report = analyze(&GitCli::new(dir), "auto").unwrap();
    assert_eq!(report.base_ref, "main");
    assert!(!report.root_dirty);
    assert!(report.branch_deltas.iter().all(|d| d.branch != "main"));

    let summary: Vec<(&str, u64, u64, BranchCategory)> = report
        .branch_deltas
        .iter()
        .map(|d| (d.branch.as_str(), d.ahead_of_base, d.behind_base, categorize(d)))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("diverged-br", 1, 1, BranchCategory::Diverged),
            ("stale-br", 0, 1, BranchCategory::Stale),
            ("ahead-br", 1, 0, BranchCategory::AheadOnly),
            ("insync-br", 0, 0, BranchCategory::InSync),
        ]
    );

    let recs = report.recommendations.join("\n");
    assert!(recs.contains("Rebase diverged branches onto main"));
    assert!(recs.contains("Rebase stale branches on top of main"));
    assert!(recs.contains("Branches ahead of main"));
}

#[test]
fn analyze_is_idempotent_on_unchanged_repository() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit(dir, "m1.txt");
    git(dir, &["branch", "feature-a"]);

    let first = TopologySnapshot::from_report(&analyze(&GitCli::new(dir), "auto").unwrap());
    let second = TopologySnapshot::from_report(&analyze(&GitCli::new(dir), "auto").unwrap());
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn analyze_reports_worktrees_with_dirty_and_detached_state() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    init_repo(&repo);
    commit(&repo, "m1.txt");

    let wt = tmp.path().join("wt-a");
    git(
        &repo,
        &["worktree", "add", "-q", "-b", "wt-branch", wt.to_str().unwrap()],
    );
    std::fs::write(wt.join("scratch.txt"), "wip").unwrap();

    let detached = tmp.path().join("wt-detached");
    git(
        &repo,
        &["worktree", "add", "-q", "--detach", detached.to_str().unwrap()],
    );

    let report = analyze(&GitCli::new(&repo), "main").unwrap();
    assert_eq!(report.worktrees.len(), 3);

    let by_branch = |name: &str| {
        report
            .worktrees
            .iter()
            .find(|w| w.branch == name)
            .unwrap_or_else(|| panic!("no worktree with branch {name}"))
    };
    assert!(by_branch("wt-branch").dirty);
    assert!(!by_branch("main").dirty);

    let sentinel = by_branch("(detached)");
    assert!(sentinel.detached);
    assert!(!sentinel.branch.is_empty());

    let recs = report.recommendations.join("\n");
    assert!(recs.contains("Dirty worktrees detected"));
}

#[test]
fn analyze_flags_dirty_root() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit(dir, "m1.txt");
    std::fs::write(dir.join("uncommitted.txt"), "wip").unwrap();

    let report = analyze(&GitCli::new(dir), "main").unwrap();
    assert!(report.root_dirty);
    assert!(report.recommendations[0].starts_with("Repository root worktree has local changes"));
}

#[test]
fn analyze_rejects_missing_explicit_base() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit(dir, "m1.txt");

    let err = analyze(&GitCli::new(dir), "does-not-exist").unwrap_err();
    assert!(err.to_string().contains("does-not-exist"));
}
