//! Heartbeat and delta monitoring loop.
//!
//! Single-threaded and poll-driven: each cycle gathers the active session
//! set and a topology snapshot, diffs both against the previous cycle,
//! and emits envelope lines for whatever changed. Heartbeats ride their
//! own timer, independent of the poll cadence. One failed cycle logs a
//! single error line and the loop keeps going; only single-shot mode
//! turns a failed cycle into a non-zero exit.

use crate::git::{analyze, GitQuery, TopologySnapshot};
use crate::output::format_utc;
use crate::session::activity::last_activity;
use crate::session::discover::{discover, is_active};
use crate::session::{ActiveSessionView, Role};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Floor for the inter-cycle sleep.
const SLEEP_FLOOR: Duration = Duration::from_millis(500);
/// Floor for the heartbeat interval.
const HEARTBEAT_FLOOR: Duration = Duration::from_secs(1);
/// Detail lines emitted per session delta.
const DELTA_DETAIL_CAP: usize = 8;
/// Sessions listed per heartbeat.
const HEARTBEAT_SESSION_CAP: usize = 5;

/// Monotonic time source driving the poll and heartbeat timers, plus the
/// wall clock stamped onto emitted lines. Injected so tests can step time
/// without sleeping.
pub trait Clock {
    /// Monotonic time elapsed since the monitor started.
    fn elapsed(&self) -> Duration;
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real time.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub project_root: PathBuf,
    pub log_root: PathBuf,
    pub base_ref: String,
    pub recent: usize,
    pub active_minutes: i64,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub once: bool,
}

/// The aggregation loop. Holds the only mutable state: the previous
/// session-id set, the previous topology snapshot, and the heartbeat
/// deadline.
pub struct Monitor<G: GitQuery, C: Clock> {
    opts: MonitorOptions,
    git: G,
    clock: C,
    prev_sessions: BTreeSet<String>,
    prev_topology: Option<TopologySnapshot>,
    next_heartbeat: Duration,
}

impl<G: GitQuery, C: Clock> Monitor<G, C> {
    pub fn new(git: G, clock: C, opts: MonitorOptions) -> Self {
        Self {
            opts,
            git,
            clock,
            prev_sessions: BTreeSet::new(),
            prev_topology: None,
            next_heartbeat: Duration::ZERO,
        }
    }

    fn gather(&self) -> Result<(Vec<ActiveSessionView>, TopologySnapshot)> {
        let now = self.clock.now_utc();
        let active: Vec<ActiveSessionView> = discover(&self.opts.log_root, &self.opts.project_root)
            .into_iter()
            .take(self.opts.recent)
            .filter(|record| is_active(&record.log_path, self.opts.active_minutes, now))
            .map(|record| {
                let activity = last_activity(&record.log_path);
                ActiveSessionView { record, activity }
            })
            .collect();

        let report = analyze(&self.git, &self.opts.base_ref)?;
        Ok((active, TopologySnapshot::from_report(&report)))
    }

    /// Run one poll cycle: gather, diff, emit. A failure is reported as a
    /// single timestamped error line on the output stream and returned so
    /// single-shot mode can exit non-zero.
    pub fn run_cycle(&mut self, out: &mut dyn Write) -> Result<()> {
        let ts = format_utc(self.clock.now_utc());

        let (active, topology) = match self.gather() {
            Ok(gathered) => gathered,
            Err(err) => {
                writeln!(out, "{ts} | error | {err:#}")?;
                return Err(err);
            }
        };

        let session_ids: BTreeSet<String> = active
            .iter()
            .map(|view| view.record.session_id.clone())
            .collect();
        if session_ids != self.prev_sessions {
            emit_session_delta(out, &ts, &self.prev_sessions, &session_ids, &active)?;
            self.prev_sessions = session_ids;
        }

        if self.prev_topology.as_ref() != Some(&topology) {
            writeln!(
                out,
                "{ts} | delta.git | {}",
                serde_json::to_string(&topology)?
            )?;
        }

        if self.clock.elapsed() >= self.next_heartbeat {
            emit_heartbeat(out, &ts, &active, &topology)?;
            self.next_heartbeat =
                self.clock.elapsed() + self.opts.heartbeat_interval.max(HEARTBEAT_FLOOR);
        }

        self.prev_topology = Some(topology);
        Ok(())
    }

    /// Drive cycles until interrupted, or exactly one cycle in single-shot
    /// mode. Returns the process exit code.
    pub async fn run(&mut self, out: &mut dyn Write) -> Result<i32> {
        loop {
            let cycle_start = self.clock.elapsed();
            let cycle_ok = self.run_cycle(out).is_ok();
            out.flush()?;

            if self.opts.once {
                return Ok(if cycle_ok { 0 } else { 1 });
            }

            // Failed cycles wait out a full interval before retrying.
            let sleep_for = if cycle_ok {
                let elapsed = self.clock.elapsed().saturating_sub(cycle_start);
                self.opts.poll_interval.saturating_sub(elapsed).max(SLEEP_FLOOR)
            } else {
                self.opts.poll_interval.max(SLEEP_FLOOR)
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = tokio::signal::ctrl_c() => return Ok(0),
            }
        }
    }
}

fn join_or_dash(ids: &[&String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn emit_session_delta(
    out: &mut dyn Write,
    ts: &str,
    prev: &BTreeSet<String>,
    current: &BTreeSet<String>,
    active: &[ActiveSessionView],
) -> std::io::Result<()> {
    let added: Vec<&String> = current.difference(prev).collect();
    let removed: Vec<&String> = prev.difference(current).collect();

    writeln!(
        out,
        "{ts} | delta.sessions | total={} | added={} | removed={}",
        current.len(),
        join_or_dash(&added),
        join_or_dash(&removed)
    )?;

    // `active` is newest-first, so this caps to the most recent additions.
    let added_set: BTreeSet<&str> = added.iter().map(|id| id.as_str()).collect();
    for view in active
        .iter()
        .filter(|view| added_set.contains(view.record.session_id.as_str()))
        .take(DELTA_DETAIL_CAP)
    {
        writeln!(
            out,
            "{ts} | delta.sessions.detail | {} | role={} | branch={} | started={} | last={}",
            view.record.session_id,
            view.record.role.label(),
            view.record.git_branch,
            view.record.started_at,
            view.activity.timestamp
        )?;
    }
    Ok(())
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn emit_heartbeat(
    out: &mut dyn Write,
    ts: &str,
    active: &[ActiveSessionView],
    topology: &TopologySnapshot,
) -> std::io::Result<()> {
    let primary = active
        .iter()
        .filter(|view| view.record.role == Role::Primary)
        .count();
    let subagent = active.len() - primary;

    writeln!(
        out,
        "{ts} | heartbeat | active={} | primary={primary} | subagent={subagent} | base={} | root_dirty={} | dirty_worktrees={} | diverged={}",
        active.len(),
        topology.base_ref,
        topology.root_dirty,
        topology.dirty_worktrees.len(),
        topology.diverged.len()
    )?;

    if active.is_empty() {
        writeln!(out, "{ts} | heartbeat.sessions | none")?;
        return Ok(());
    }

    let pieces: Vec<String> = active
        .iter()
        .take(HEARTBEAT_SESSION_CAP)
        .map(|view| {
            format!(
                "{}:{}:{}",
                short_id(&view.record.session_id),
                view.record.role.marker(),
                view.record.git_branch
            )
        })
        .collect();
    writeln!(out, "{ts} | heartbeat.sessions | {}", pieces.join(", "))?;
    Ok(())
}
