//! Session discovery, classification, and activity extraction.
//!
//! Sessions are recorded units of agent work backed by append-only JSONL
//! logs under a shared log root. Discovery is a pure filter+classify pass
//! over both the live and archived partitions; it does not deduplicate
//! ids across partitions, so a session present in both is reported twice.

pub mod activity;
pub mod discover;
pub mod record;
pub mod tail;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Where a session sits in the spawn hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Subagent,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Subagent => "subagent",
        }
    }

    /// Single-char marker for abbreviated listings.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Primary => "p",
            Self::Subagent => "s",
        }
    }
}

/// One discovered session. Recomputed fresh on every discovery pass;
/// identity across polls is the session id alone.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    /// Start timestamp as recorded in the log, kept verbatim for display.
    pub started_at: String,
    #[serde(skip)]
    pub started_at_utc: DateTime<Utc>,
    pub role: Role,
    pub parent_thread_id: String,
    pub depth: String,
    pub git_branch: String,
    pub cwd: String,
    pub log_path: PathBuf,
}

/// Latest non-empty activity found in a session log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivitySnapshot {
    pub timestamp: String,
    pub summary: String,
}

/// A session joined with its latest activity; the unit the monitor loop
/// reasons about.
#[derive(Debug, Clone)]
pub struct ActiveSessionView {
    pub record: SessionRecord,
    pub activity: ActivitySnapshot,
}
