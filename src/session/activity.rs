//! Per-record summarization policy and last-activity extraction.
//!
//! Every known record type maps to a fixed one-line summary; token-count
//! events are explicitly suppressed so they never clobber a meaningful
//! summary. The last non-empty summary in a log wins.

use crate::session::record::{parse_line, MessageContent, RecordBody};
use crate::session::ActivitySnapshot;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Character bound for message snippets.
pub const SUMMARY_LIMIT: usize = 100;

/// Collapse whitespace runs to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize whitespace, then bound to `limit` characters with a `...`
/// marker. Counts characters, not bytes, so multibyte text stays intact.
pub fn truncate(text: &str, limit: usize) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= limit {
        return normalized;
    }
    let cut: String = normalized.chars().take(limit.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn first_text(content: &[MessageContent]) -> String {
    content
        .iter()
        .filter_map(|item| item.text.as_deref())
        .find(|text| !text.trim().is_empty())
        .map(normalize_whitespace)
        .unwrap_or_default()
}

/// Map one record to its activity summary. `None` means the record is
/// suppressed and must not overwrite an earlier summary.
pub fn summarize(body: &RecordBody) -> Option<String> {
    match body {
        RecordBody::SessionMeta(meta) => Some(format!("session start cwd={}", meta.cwd)),
        RecordBody::TurnContext { cwd } => Some(format!("turn cwd={cwd}")),
        RecordBody::FunctionCall { name } => {
            let name = if name.is_empty() { "unknown" } else { name };
            Some(format!("tool call {name}"))
        }
        RecordBody::FunctionCallOutput => Some("tool output".to_string()),
        RecordBody::Reasoning => Some("reasoning item".to_string()),
        RecordBody::Message { role, content } => {
            let role = if role.is_empty() { "unknown" } else { role };
            let snippet = first_text(content);
            if snippet.is_empty() {
                Some(format!("message {role}"))
            } else {
                Some(format!("message {role}: {}", truncate(&snippet, SUMMARY_LIMIT)))
            }
        }
        RecordBody::ResponseOther(item_type) => {
            if item_type.is_empty() {
                Some("response item".to_string())
            } else {
                Some(format!("response item {item_type}"))
            }
        }
        RecordBody::Event(msg_type) => match msg_type.as_str() {
            "token_count" => None,
            "" => Some("event message".to_string()),
            other => Some(format!("event {other}")),
        },
        RecordBody::Unknown(kind) => Some(kind.clone()),
    }
}

/// Stream the whole log and return the newest non-empty summary with the
/// timestamp of the record that produced it. Unreadable files and
/// malformed lines degrade to whatever was collected before them.
pub fn last_activity(log_path: &Path) -> ActivitySnapshot {
    let mut snapshot = ActivitySnapshot::default();
    let file = match File::open(log_path) {
        Ok(file) => file,
        Err(_) => return snapshot,
    };

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let Some(record) = parse_line(&line) else {
            continue;
        };
        let Some(summary) = summarize(&record.body) else {
            continue;
        };
        if let Some(ts) = record.timestamp {
            if !ts.is_empty() {
                snapshot.timestamp = ts;
            }
        }
        snapshot.summary = summary;
    }
    snapshot
}
