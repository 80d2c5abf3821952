//! User configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.config/todu/
//!   config.yaml            (this module)
//!   daemon-status.json     (written by the daemon)
//!   logs/daemon.log        (service stdout/stderr)
//! ```
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home, used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! A missing file is not an error: every field has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_INTERVAL: &str = "5m";
pub const DEFAULT_ENGINE_PROGRAM: &str = "todu-sync";

pub const ENV_INTERVAL: &str = "TODU_DAEMON_INTERVAL";
pub const ENV_ENGINE: &str = "TODU_ENGINE";

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub recurring: RecurringSection,
    #[serde(default)]
    pub reports: ReportsSection,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Sync interval as a duration string (`"5m"`, `"90s"`, `"100ms"`).
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Project allowlist; empty syncs every project.
    #[serde(default)]
    pub projects: Vec<String>,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            projects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecurringSection {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportsSection {
    /// Directory journal exports are written to. Export is skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Executable invoked for sync, recurring and journal operations.
    #[serde(default = "default_engine_program")]
    pub program: PathBuf,
    /// Arguments placed before the subcommand, e.g. a script for an interpreter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            args: Vec::new(),
        }
    }
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

fn default_engine_program() -> PathBuf {
    PathBuf::from(DEFAULT_ENGINE_PROGRAM)
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.config/todu/`. Pure.
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".config").join("todu")
}

/// `<home>/.config/todu/config.yaml`. Pure.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join(CONFIG_FILE)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `<home>/.config/todu/config.yaml`, then apply environment overrides.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let mut config = load_file_at(home)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.expand_home(home);
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Parse the config file only, without environment overrides or `~` expansion.
pub fn load_file_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

impl Config {
    /// Apply `TODU_DAEMON_INTERVAL` / `TODU_ENGINE` from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(interval) = lookup(ENV_INTERVAL).filter(|v| !v.trim().is_empty()) {
            self.daemon.interval = interval.trim().to_string();
        }
        if let Some(program) = lookup(ENV_ENGINE).filter(|v| !v.trim().is_empty()) {
            self.engine.program = PathBuf::from(program.trim());
        }
    }

    /// Expand a leading `~/` in `reports.path`.
    pub fn expand_home(&mut self, home: &Path) {
        if let Some(path) = self.reports.path.take() {
            let expanded = match path.strip_prefix("~") {
                Ok(rest) => home.join(rest),
                Err(_) => path,
            };
            self.reports.path = Some(expanded);
        }
    }
}
