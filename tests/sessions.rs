//! End-to-end session discovery, activity, and tailing against a
//! fabricated log tree.

use shepherd::session::activity::last_activity;
use shepherd::session::discover::{discover, is_active};
use shepherd::session::tail::TailEngine;
use shepherd::session::{Role, SessionRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn append_lines(path: &Path, lines: &[String]) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn meta_line(id: &str, timestamp: &str, cwd: &str) -> String {
    format!(
        r#"{{"timestamp":"{timestamp}","type":"session_meta","payload":{{"id":"{id}","timestamp":"{timestamp}","cwd":"{cwd}","git":{{"branch":"main"}}}}}}"#
    )
}

fn subagent_meta_line(id: &str, timestamp: &str, cwd: &str, parent: &str, depth: i64) -> String {
    format!(
        r#"{{"timestamp":"{timestamp}","type":"session_meta","payload":{{"id":"{id}","timestamp":"{timestamp}","cwd":"{cwd}","source":{{"subagent":{{"thread_spawn":{{"parent_thread_id":"{parent}","depth":{depth}}}}}}},"git":{{"branch":"feat"}}}}}}"#
    )
}

fn tool_call_line(timestamp: &str, name: &str) -> String {
    format!(
        r#"{{"timestamp":"{timestamp}","type":"response_item","payload":{{"type":"function_call","name":"{name}"}}}}"#
    )
}

#[test]
fn discovery_classifies_filters_and_orders() {
    let tmp = tempfile::tempdir().unwrap();
    let log_root = tmp.path().join("logs");
    let project = tmp.path().join("proj");
    fs::create_dir_all(project.join("sub")).unwrap();
    fs::create_dir_all(tmp.path().join("proj2/sub")).unwrap();
    let cwd = project.to_string_lossy().to_string();
    let nested_cwd = project.join("sub").to_string_lossy().to_string();
    let sibling_cwd = tmp.path().join("proj2/sub").to_string_lossy().to_string();

    write_lines(
        &log_root.join("sessions/2026/02/01/rollout-primary.jsonl"),
        &[meta_line("primary-1", "2026-02-01T10:00:00Z", &cwd)],
    );
    write_lines(
        &log_root.join("sessions/2026/02/01/rollout-sub.jsonl"),
        &[subagent_meta_line(
            "sub-1",
            "2026-02-01T11:00:00Z",
            &nested_cwd,
            "thread-9",
            1,
        )],
    );
    // shares a string prefix with the project root, but is a sibling
    write_lines(
        &log_root.join("sessions/2026/02/01/rollout-sibling.jsonl"),
        &[meta_line("sibling-1", "2026-02-01T12:00:00Z", &sibling_cwd)],
    );
    // same id visible in the archived partition: reported twice by design
    write_lines(
        &log_root.join("archived_sessions/rollout-primary.jsonl"),
        &[meta_line("primary-1", "2026-02-01T10:00:00Z", &cwd)],
    );

    let records = discover(&log_root, &project);
    let ids: Vec<&str> = records.iter().map(|r| r.session_id.as_str()).collect();
    assert_eq!(ids, vec!["sub-1", "primary-1", "primary-1"]);

    let sub = &records[0];
    assert_eq!(sub.role, Role::Subagent);
    assert_eq!(sub.parent_thread_id, "thread-9");
    assert_eq!(sub.depth, "1");
    assert_eq!(sub.git_branch, "feat");

    let primary = &records[1];
    assert_eq!(primary.role, Role::Primary);
    assert!(primary.parent_thread_id.is_empty());

    // freshly written logs sit inside any reasonable recency window
    assert!(records.iter().all(|r| is_active(&r.log_path, 30, Utc::now())));
}

#[test]
fn activity_extraction_reads_the_whole_log() {
    let tmp = tempfile::tempdir().unwrap();
    let log_root = tmp.path().join("logs");
    let project = tmp.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    let cwd = project.to_string_lossy().to_string();

    let log = log_root.join("sessions/2026/02/01/rollout-a.jsonl");
    write_lines(
        &log,
        &[
            meta_line("a", "2026-02-01T10:00:00Z", &cwd),
            tool_call_line("2026-02-01T10:01:00Z", "shell"),
            r#"{"timestamp":"2026-02-01T10:02:00Z","type":"response_item","payload":{"type":"message","role":"assistant","content":[{"text":"running the   test suite now"}]}}"#.to_string(),
            // suppressed trailing noise
            r#"{"timestamp":"2026-02-01T10:03:00Z","type":"event_msg","payload":{"type":"token_count"}}"#.to_string(),
        ],
    );

    let snapshot = last_activity(&log);
    assert_eq!(snapshot.timestamp, "2026-02-01T10:02:00Z");
    assert_eq!(
        snapshot.summary,
        "message assistant: running the test suite now"
    );
}

#[test]
fn tail_round_trip_through_discovery() {
    let tmp = tempfile::tempdir().unwrap();
    let log_root = tmp.path().join("logs");
    let project = tmp.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    let cwd = project.to_string_lossy().to_string();

    let log = log_root.join("sessions/2026/02/01/rollout-a.jsonl");
    write_lines(&log, &[meta_line("sess-a", "2026-02-01T10:00:00Z", &cwd)]);

    let sessions = discover(&log_root, &project);
    let by_log: HashMap<PathBuf, SessionRecord> = sessions
        .iter()
        .map(|record| (record.log_path.clone(), record.clone()))
        .collect();

    let mut engine = TailEngine::new(false);
    for record in &sessions {
        engine.track(&record.log_path);
    }

    // nothing new yet
    assert!(engine.poll(&by_log).is_empty());

    append_lines(
        &log,
        &[
            tool_call_line("2026-02-01T10:05:00Z", "apply_patch"),
            tool_call_line("2026-02-01T10:06:00Z", "shell"),
        ],
    );

    let events = engine.poll(&by_log);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].summary, "tool call apply_patch");
    assert_eq!(events[0].timestamp, "2026-02-01T10:05:00Z");
    let session = events[0].session.as_ref().unwrap();
    assert_eq!(session.session_id, "sess-a");
    assert_eq!(session.role, Role::Primary);

    // a second poll with no appends emits nothing
    assert!(engine.poll(&by_log).is_empty());
}
