//! Discovery and classification of session logs.
//!
//! Scans both partitions of the log root, reads each file only as far as
//! its `session_meta` record, validates and classifies it, and keeps the
//! sessions whose working directory sits inside the project root.

use crate::session::record::{parse_line, RecordBody, SessionMetaPayload};
use crate::session::{Role, SessionRecord};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default log root: `$CODEX_HOME`, else `~/.codex`.
pub fn default_log_root() -> PathBuf {
    std::env::var("CODEX_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|home| home.join(".codex"))
                .unwrap_or_else(|| PathBuf::from(".codex"))
        })
}

/// Every log resource under the root: the live partition
/// (`sessions/`, date-sharded, scanned recursively) plus the archived
/// partition (`archived_sessions/`, flat).
pub fn list_log_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let live = root.join("sessions");
    if live.is_dir() {
        for entry in WalkDir::new(&live).into_iter().flatten() {
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(entry.into_path());
            }
        }
    }

    let archived = root.join("archived_sessions");
    if let Ok(entries) = fs::read_dir(&archived) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }
    }

    files
}

/// Read forward only until the first `session_meta` record; never scans a
/// whole file just to discover it. Unreadable files yield `None`.
pub fn read_session_meta(log_path: &Path) -> Option<SessionMetaPayload> {
    let file = fs::File::open(log_path).ok()?;
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { return None };
        let Some(record) = parse_line(&line) else {
            continue;
        };
        if let RecordBody::SessionMeta(meta) = record.body {
            return Some(meta);
        }
    }
    None
}

/// Validate and classify one `session_meta` payload. Records missing id,
/// timestamp, or working directory are rejected, as are start timestamps
/// that cannot be ordered.
pub fn to_session_record(log_path: &Path, meta: SessionMetaPayload) -> Option<SessionRecord> {
    let session_id = meta.id.trim().to_string();
    let started_at = meta.timestamp.trim().to_string();
    if session_id.is_empty() || started_at.is_empty() || meta.cwd.is_empty() {
        return None;
    }
    let started_at_utc = DateTime::parse_from_rfc3339(&started_at)
        .ok()?
        .with_timezone(&Utc);

    let (role, parent_thread_id, depth) = match meta.source.subagent.thread_spawn {
        Some(spawn) if !spawn.is_empty() => (
            Role::Subagent,
            spawn.parent_thread_id,
            spawn.depth.map(|d| d.to_string()).unwrap_or_default(),
        ),
        _ => (Role::Primary, String::new(), String::new()),
    };

    Some(SessionRecord {
        session_id,
        started_at,
        started_at_utc,
        role,
        parent_thread_id,
        depth,
        git_branch: meta.git.branch,
        cwd: meta.cwd,
        log_path: log_path.to_path_buf(),
    })
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Whether `path` sits inside `root`, compared component-wise on
/// canonical (symlink-resolved) paths. A sibling directory sharing a
/// string prefix is not contained.
pub fn is_within_root(root: &Path, path: &Path) -> bool {
    let root = canonical_or_raw(root);
    let path = canonical_or_raw(path);
    path.starts_with(&root)
}

/// Discover every session under `log_root` whose working directory is
/// contained in `project_root`, newest first. Duplicate session ids
/// across the live and archived partitions are both reported.
pub fn discover(log_root: &Path, project_root: &Path) -> Vec<SessionRecord> {
    let mut records: Vec<SessionRecord> = list_log_files(log_root)
        .into_iter()
        .filter_map(|path| {
            let meta = read_session_meta(&path)?;
            to_session_record(&path, meta)
        })
        .filter(|record| is_within_root(project_root, Path::new(&record.cwd)))
        .collect();

    records.sort_by(|a, b| b.started_at_utc.cmp(&a.started_at_utc));
    records
}

/// Whether the log was modified within the recency window of `now`.
/// `now` is captured once per discovery pass so every resource is judged
/// against the same instant.
pub fn is_active(log_path: &Path, window_minutes: i64, now: DateTime<Utc>) -> bool {
    let Ok(metadata) = fs::metadata(log_path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    DateTime::<Utc>::from(modified) >= now - Duration::minutes(window_minutes)
}
