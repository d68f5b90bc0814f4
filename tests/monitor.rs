//! One full monitor cycle composed end-to-end: real repository, real log
//! tree, real clock.

use shepherd::git::GitCli;
use shepherd::monitor::{Monitor, MonitorOptions, SystemClock};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

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

#[test]
fn first_cycle_emits_session_delta_topology_delta_and_heartbeat() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    git(&repo, &["init", "--quiet"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "user.name", "Test"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    fs::write(repo.join("README"), "hello").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "init"]);

    let log_root = tmp.path().join("logs");
    let log_dir = log_root.join("sessions/2026/02/01");
    fs::create_dir_all(&log_dir).unwrap();
    let cwd = repo.to_string_lossy().to_string();
    let mut file = fs::File::create(log_dir.join("rollout-a.jsonl")).unwrap();
    writeln!(
        file,
        r#"{{"timestamp":"2026-02-01T10:00:00Z","type":"session_meta","payload":{{"id":"sess-a","timestamp":"2026-02-01T10:00:00Z","cwd":"{cwd}","git":{{"branch":"main"}}}}}}"#
    )
    .unwrap();

    let opts = MonitorOptions {
        project_root: repo.clone(),
        log_root,
        base_ref: "auto".to_string(),
        recent: 300,
        active_minutes: 30,
        poll_interval: Duration::from_secs(5),
        heartbeat_interval: Duration::from_secs(20),
        once: true,
    };
    let mut monitor = Monitor::new(GitCli::new(&repo), SystemClock::new(), opts);

    let mut buf = Vec::new();
    monitor.run_cycle(&mut buf).unwrap();
    let out = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 5);
    assert!(lines[0].contains("| delta.sessions | total=1 | added=sess-a | removed=-"));
    assert!(lines[1].contains("| delta.sessions.detail | sess-a | role=primary | branch=main"));
    assert!(lines[2].contains(r#"| delta.git | {"base_ref":"main","#));
    assert!(lines[3].contains("| heartbeat | active=1 | primary=1 | subagent=0 | base=main | root_dirty=false"));
    assert!(lines[4].contains("| heartbeat.sessions | sess-a:p:main"));
}
