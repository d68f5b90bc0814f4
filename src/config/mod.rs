//! Optional configuration file support.
//!
//! Every setting has a working default so the tool runs with zero setup.
//! A TOML file at `<config dir>/shepherd/config.toml` (or `--config PATH`)
//! overrides the defaults, and CLI flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Roots the commands operate on. Unset values fall back to the current
/// directory (project/repo root) or the session log home (log root).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    #[serde(default)]
    pub repo_root: Option<PathBuf>,
    #[serde(default)]
    pub log_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: f64,
    #[serde(default = "default_base_ref")]
    pub base_ref: String,
}

fn default_poll_interval() -> f64 {
    5.0
}

fn default_heartbeat_interval() -> f64 {
    20.0
}

fn default_base_ref() -> String {
    "auto".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            base_ref: default_base_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_active_minutes")]
    pub active_minutes: i64,
}

fn default_active_minutes() -> i64 {
    30
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            active_minutes: default_active_minutes(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = directories::ProjectDirs::from("", "", "shepherd")
        .context("Could not determine config directory")?
        .config_dir()
        .to_path_buf();
    Ok(dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration. An explicit path must exist and parse; the default
/// path is optional and its absence means defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path()?, false),
    };

    if !path.exists() {
        if required {
            anyhow::bail!("Config file not found at {}", path.display());
        }
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(config)
}
