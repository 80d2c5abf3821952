//! Durable daemon status record.
//!
//! The running loop is the only writer; `todu daemon status` (a separate
//! process) is the main reader. Writes go to `<path>.tmp` and are renamed
//! over the target so readers never observe a partial document.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, DaemonError};
use crate::paths::status_path;

/// Operator-visible daemon health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_sync_time: Option<DateTime<Utc>>,
}

impl Status {
    pub fn mark_running(&mut self, pid: u32) {
        self.running = true;
        self.pid = Some(pid);
    }

    pub fn mark_stopped(&mut self) {
        self.running = false;
        self.pid = None;
    }
}

#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<home>/.config/todu/daemon-status.json`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(status_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `status`. Failures are logged and swallowed; a broken status
    /// file must never take the sync loop down.
    pub fn write(&self, status: &Status) {
        if let Err(err) = self.try_write(status) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to write daemon status");
        }
    }

    /// Persist `status` atomically (`.tmp` + rename), creating parent directories.
    pub fn try_write(&self, status: &Status) -> Result<(), DaemonError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let payload = serde_json::to_vec_pretty(status)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
    }

    /// Load the status record.
    ///
    /// A missing file is the normal "never started" state and yields the
    /// default record. A record claiming `running` for a PID that no longer
    /// exists is corrected to stopped before it is returned.
    pub fn read(&self) -> Result<Status, DaemonError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Status::default()),
            Err(err) => return Err(io_err(&self.path, err)),
        };
        let mut status: Status = serde_json::from_slice(&contents)?;

        if status.running {
            if let Some(pid) = status.pid {
                if !process_alive(pid) {
                    tracing::debug!(pid, "recorded daemon pid is gone, reporting stopped");
                    status.mark_stopped();
                }
            }
        }
        Ok(status)
    }
}

/// Non-destructive existence check for `pid`.
///
/// A process we are not allowed to signal counts as gone. PID 0 would
/// address our own process group and is never treated as a daemon.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => kill(Pid::from_raw(raw), None).is_ok(),
        _ => false,
    }
}

/// No portable probe off unix; trust the record.
#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    pid != 0
}
