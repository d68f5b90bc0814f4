//! Incremental tailing of session logs.
//!
//! The engine owns one byte offset per tracked log. Offsets only move
//! forward while a file is stable; a file that shrank underneath its
//! cursor is re-read from the start, and a file that vanished or fails
//! to read loses its cursor without disturbing the others.

use crate::session::activity::summarize;
use crate::session::discover::{discover, is_active};
use crate::session::record::parse_line;
use crate::session::SessionRecord;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Floor for the follow poll interval.
const POLL_FLOOR: Duration = Duration::from_millis(500);

/// One newly appended, summarized event.
#[derive(Debug, Clone)]
pub struct TailEvent {
    pub timestamp: String,
    pub summary: String,
    pub source: PathBuf,
    /// The session the log belonged to at poll time, when known.
    pub session: Option<SessionRecord>,
}

/// Per-log read cursors. The map is owned exclusively by one engine
/// instance; nothing else writes it.
pub struct TailEngine {
    offsets: HashMap<PathBuf, u64>,
    from_start: bool,
}

impl TailEngine {
    pub fn new(from_start: bool) -> Self {
        Self {
            offsets: HashMap::new(),
            from_start,
        }
    }

    /// Number of logs currently tracked.
    pub fn tracked(&self) -> usize {
        self.offsets.len()
    }

    /// Begin tracking `path` if it is new. The initial offset is the
    /// current end of file (history is skipped) unless from-start mode
    /// asked for offset zero.
    pub fn track(&mut self, path: &Path) {
        if self.offsets.contains_key(path) {
            return;
        }
        let offset = if self.from_start {
            0
        } else {
            match fs::metadata(path) {
                Ok(metadata) => metadata.len(),
                Err(_) => return,
            }
        };
        self.offsets.insert(path.to_path_buf(), offset);
    }

    /// Read every tracked log past its cursor and return the summarized
    /// events, advancing each cursor to the end position that was read.
    /// Vanished logs drop their cursor silently; an I/O failure drops
    /// only that log's cursor.
    pub fn poll(&mut self, sessions_by_log: &HashMap<PathBuf, SessionRecord>) -> Vec<TailEvent> {
        let mut events = Vec::new();
        let tracked: Vec<PathBuf> = self.offsets.keys().cloned().collect();

        for path in tracked {
            if !path.exists() {
                self.offsets.remove(&path);
                continue;
            }
            let Some(mut offset) = self.offsets.get(&path).copied() else {
                continue;
            };

            let size = match fs::metadata(&path) {
                Ok(metadata) => metadata.len(),
                Err(_) => {
                    self.offsets.remove(&path);
                    continue;
                }
            };
            // Truncated underneath us: start over from the beginning.
            if offset > size {
                offset = 0;
            }

            match read_from(&path, offset) {
                Ok((chunk, end)) => {
                    for line in chunk.lines() {
                        let Some(record) = parse_line(line) else {
                            continue;
                        };
                        let Some(summary) = summarize(&record.body) else {
                            continue;
                        };
                        events.push(TailEvent {
                            timestamp: record.timestamp.unwrap_or_default(),
                            summary,
                            source: path.clone(),
                            session: sessions_by_log.get(&path).cloned(),
                        });
                    }
                    self.offsets.insert(path.clone(), end);
                }
                Err(err) => {
                    tracing::debug!("dropping tail cursor for {}: {err}", path.display());
                    self.offsets.remove(&path);
                }
            }
        }
        events
    }
}

fn read_from(path: &Path, offset: u64) -> std::io::Result<(String, u64)> {
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut chunk = String::new();
    file.read_to_string(&mut chunk)?;
    let len = chunk.len() as u64;
    Ok((chunk, offset + len))
}

/// Options for the follow loop.
#[derive(Debug, Clone)]
pub struct FollowOptions {
    pub log_root: PathBuf,
    pub project_root: PathBuf,
    pub recent: usize,
    pub active_minutes: i64,
    pub interval: Duration,
    pub from_start: bool,
}

/// Print one envelope line per newly appended event until interrupted.
pub async fn follow(opts: &FollowOptions, out: &mut (impl Write + Send)) -> Result<()> {
    let mut engine = TailEngine::new(opts.from_start);
    let recent_cap = opts.recent.max(1);

    writeln!(
        out,
        "Following sessions under {} for project root {}. Polling every {:.1}s. Press Ctrl-C to stop.",
        opts.log_root.display(),
        opts.project_root.display(),
        opts.interval.as_secs_f64()
    )?;
    out.flush()?;

    loop {
        let now = Utc::now();
        let sessions: Vec<SessionRecord> = discover(&opts.log_root, &opts.project_root)
            .into_iter()
            .take(recent_cap)
            .collect();
        let by_log: HashMap<PathBuf, SessionRecord> = sessions
            .iter()
            .map(|record| (record.log_path.clone(), record.clone()))
            .collect();

        for record in &sessions {
            if is_active(&record.log_path, opts.active_minutes, now) {
                engine.track(&record.log_path);
            }
        }

        for event in engine.poll(&by_log) {
            match &event.session {
                Some(session) => writeln!(
                    out,
                    "{} | {} | {} | {} | {} | {}",
                    event.timestamp,
                    session.session_id,
                    session.role.label(),
                    session.cwd,
                    event.summary,
                    event.source.display()
                )?,
                None => writeln!(
                    out,
                    "{} | unknown | {} | {}",
                    event.timestamp,
                    event.summary,
                    event.source.display()
                )?,
            }
        }
        out.flush()?;

        tokio::select! {
            _ = tokio::time::sleep(opts.interval.max(POLL_FLOOR)) => {}
            _ = tokio::signal::ctrl_c() => {
                writeln!(out, "\nStopped.")?;
                return Ok(());
            }
        }
    }
}
