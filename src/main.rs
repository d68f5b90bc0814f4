use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use shepherd::config::Config;
use shepherd::git::{self, categorize, GitCli};
use shepherd::monitor::{Monitor, MonitorOptions, SystemClock};
use shepherd::session::tail::{follow, FollowOptions};
use shepherd::session::{activity, discover};
use shepherd::{config, output};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "shepherd")]
#[command(about = "Monitor AI agent sessions coordinating work on a shared git repository")]
#[command(version)]
struct Args {
    /// Path to config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize branch/worktree topology and recommended actions
    Topology {
        /// Repository root (defaults to the current directory)
        #[arg(long)]
        repo_root: Option<PathBuf>,
        /// Base branch/ref to compare against; "auto" detects one
        #[arg(long)]
        base_ref: Option<String>,
        /// Emit one JSON document instead of tables
        #[arg(long)]
        json: bool,
    },
    /// List sessions discovered for the project root
    Inventory {
        /// Session log root (defaults to $CODEX_HOME or ~/.codex)
        #[arg(long)]
        log_root: Option<PathBuf>,
        /// Keep only sessions working inside this directory
        #[arg(long)]
        project_root: Option<PathBuf>,
        /// Show only the N most recently started sessions
        #[arg(long, default_value_t = 20)]
        recent: usize,
        /// Recency window for the active flag, in minutes
        #[arg(long)]
        active_minutes: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Show each session's most recent activity
    Activity {
        #[arg(long)]
        log_root: Option<PathBuf>,
        #[arg(long)]
        project_root: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        recent: usize,
        #[arg(long)]
        json: bool,
    },
    /// Stream newly appended session events
    Follow {
        #[arg(long)]
        log_root: Option<PathBuf>,
        #[arg(long)]
        project_root: Option<PathBuf>,
        #[arg(long, default_value_t = 40)]
        recent: usize,
        /// Poll interval in seconds
        #[arg(long, default_value_t = 2.0)]
        interval: f64,
        #[arg(long)]
        active_minutes: Option<i64>,
        /// Replay each log from the beginning instead of skipping history
        #[arg(long)]
        from_start: bool,
    },
    /// Emit heartbeats and change deltas for sessions and topology
    Monitor {
        #[arg(long)]
        project_root: Option<PathBuf>,
        /// Repository root (defaults to the project root)
        #[arg(long)]
        repo_root: Option<PathBuf>,
        #[arg(long)]
        log_root: Option<PathBuf>,
        #[arg(long, default_value_t = 300)]
        recent: usize,
        #[arg(long)]
        active_minutes: Option<i64>,
        /// Poll interval in seconds
        #[arg(long)]
        poll_interval: Option<f64>,
        /// Heartbeat interval in seconds
        #[arg(long)]
        heartbeat_interval: Option<f64>,
        #[arg(long)]
        base_ref: Option<String>,
        /// Run exactly one cycle, then exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            2
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shepherd=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load(args.config.as_deref())?;

    match args.command {
        Command::Topology {
            repo_root,
            base_ref,
            json,
        } => cmd_topology(&config, repo_root, base_ref, json),
        Command::Inventory {
            log_root,
            project_root,
            recent,
            active_minutes,
            json,
        } => cmd_inventory(&config, log_root, project_root, recent, active_minutes, json),
        Command::Activity {
            log_root,
            project_root,
            recent,
            json,
        } => cmd_activity(&config, log_root, project_root, recent, json),
        Command::Follow {
            log_root,
            project_root,
            recent,
            interval,
            active_minutes,
            from_start,
        } => {
            let opts = FollowOptions {
                log_root: resolve_log_root(log_root, &config),
                project_root: resolve_dir(project_root, &config.paths.project_root)?,
                recent,
                active_minutes: active_minutes.unwrap_or(config.sessions.active_minutes),
                interval: seconds(interval),
                from_start,
            };
            follow(&opts, &mut std::io::stdout()).await?;
            Ok(0)
        }
        Command::Monitor {
            project_root,
            repo_root,
            log_root,
            recent,
            active_minutes,
            poll_interval,
            heartbeat_interval,
            base_ref,
            once,
        } => {
            let project_root = resolve_dir(project_root, &config.paths.project_root)?;
            let repo_root = repo_root
                .or_else(|| config.paths.repo_root.clone())
                .unwrap_or_else(|| project_root.clone());
            let opts = MonitorOptions {
                project_root,
                log_root: resolve_log_root(log_root, &config),
                base_ref: base_ref.unwrap_or_else(|| config.monitor.base_ref.clone()),
                recent,
                active_minutes: active_minutes.unwrap_or(config.sessions.active_minutes),
                poll_interval: seconds(
                    poll_interval.unwrap_or(config.monitor.poll_interval_secs),
                ),
                heartbeat_interval: seconds(
                    heartbeat_interval.unwrap_or(config.monitor.heartbeat_interval_secs),
                ),
                once,
            };
            let mut monitor = Monitor::new(GitCli::new(repo_root), SystemClock::new(), opts);
            let code = monitor.run(&mut std::io::stdout()).await?;
            Ok(code)
        }
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::from_secs_f64(secs.max(0.0))
}

fn resolve_dir(flag: Option<PathBuf>, configured: &Option<PathBuf>) -> Result<PathBuf> {
    match flag.or_else(|| configured.clone()) {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

fn resolve_log_root(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.paths.log_root.clone())
        .unwrap_or_else(discover::default_log_root)
}

fn cmd_topology(
    config: &Config,
    repo_root: Option<PathBuf>,
    base_ref: Option<String>,
    json: bool,
) -> Result<i32> {
    let repo_root = resolve_dir(repo_root, &config.paths.repo_root)?;
    let base = base_ref.unwrap_or_else(|| config.monitor.base_ref.clone());
    let git = GitCli::new(repo_root);
    let report = git::analyze(&git, &base)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(0);
    }

    println!("Base branch/ref:");
    println!("{}", report.base_ref);
    println!();

    println!("Repo root status:");
    println!("{}", report.repo_root_status);
    println!();

    println!("Branch deltas vs {}:", report.base_ref);
    let branch_rows: Vec<Vec<String>> = report
        .branch_deltas
        .iter()
        .map(|delta| {
            vec![
                delta.branch.clone(),
                delta.ahead_of_base.to_string(),
                delta.behind_base.to_string(),
                categorize(delta).label().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        output::render_table(&["branch", "ahead", "behind", "category"], &branch_rows)
    );
    println!();

    println!("Worktrees:");
    let worktree_rows: Vec<Vec<String>> = report
        .worktrees
        .iter()
        .map(|worktree| {
            vec![
                worktree.branch.clone(),
                output::yes_no(worktree.dirty).to_string(),
                output::yes_no(worktree.prunable).to_string(),
                worktree.path.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        output::render_table(&["branch", "dirty", "prunable", "path"], &worktree_rows)
    );
    println!();

    println!("Recommended actions:");
    for (idx, rec) in report.recommendations.iter().enumerate() {
        println!("{}. {rec}", idx + 1);
    }

    Ok(0)
}

fn cmd_inventory(
    config: &Config,
    log_root: Option<PathBuf>,
    project_root: Option<PathBuf>,
    recent: usize,
    active_minutes: Option<i64>,
    json: bool,
) -> Result<i32> {
    let log_root = resolve_log_root(log_root, config);
    let project_root = resolve_dir(project_root, &config.paths.project_root)?;
    let active_minutes = active_minutes.unwrap_or(config.sessions.active_minutes);

    let sessions = discover::discover(&log_root, &project_root);
    let now = Utc::now();
    let recent_rows: Vec<_> = sessions
        .iter()
        .take(recent)
        .map(|record| {
            (
                record,
                discover::is_active(&record.log_path, active_minutes, now),
            )
        })
        .collect();

    if json {
        let rows: Vec<serde_json::Value> = recent_rows
            .iter()
            .map(|(record, active)| {
                json!({
                    "session_id": record.session_id,
                    "started_at": record.started_at,
                    "role": record.role.label(),
                    "parent_thread_id": record.parent_thread_id,
                    "depth": record.depth,
                    "git_branch": record.git_branch,
                    "cwd": record.cwd,
                    "log_path": record.log_path,
                    "active": active,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"count": sessions.len(), "recent": rows}))?
        );
        return Ok(0);
    }

    println!("Matched sessions: {}", sessions.len());
    let rows: Vec<Vec<String>> = recent_rows
        .iter()
        .map(|(record, active)| {
            vec![
                record.session_id.clone(),
                record.started_at.clone(),
                record.role.label().to_string(),
                record.git_branch.clone(),
                output::yes_no(*active).to_string(),
                record.log_path.display().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        output::render_table(
            &["session_id", "started_at", "role", "branch", "active", "log_path"],
            &rows
        )
    );
    Ok(0)
}

fn cmd_activity(
    config: &Config,
    log_root: Option<PathBuf>,
    project_root: Option<PathBuf>,
    recent: usize,
    json: bool,
) -> Result<i32> {
    let log_root = resolve_log_root(log_root, config);
    let project_root = resolve_dir(project_root, &config.paths.project_root)?;

    let sessions = discover::discover(&log_root, &project_root);
    let recent_rows: Vec<_> = sessions
        .iter()
        .take(recent)
        .map(|record| (record, activity::last_activity(&record.log_path)))
        .collect();

    if json {
        let rows: Vec<serde_json::Value> = recent_rows
            .iter()
            .map(|(record, snapshot)| {
                json!({
                    "session_id": record.session_id,
                    "started_at": record.started_at,
                    "cwd": record.cwd,
                    "role": record.role.label(),
                    "git_branch": record.git_branch,
                    "last_timestamp": snapshot.timestamp,
                    "last_summary": snapshot.summary,
                    "log_path": record.log_path,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({"count": sessions.len(), "activity": rows}))?
        );
        return Ok(0);
    }

    let rows: Vec<Vec<String>> = recent_rows
        .iter()
        .map(|(record, snapshot)| {
            vec![
                record.session_id.clone(),
                record.role.label().to_string(),
                snapshot.timestamp.clone(),
                activity::truncate(&snapshot.summary, 90),
                record.log_path.display().to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        output::render_table(
            &["session_id", "role", "last_timestamp", "activity", "log_path"],
            &rows
        )
    );
    Ok(0)
}
