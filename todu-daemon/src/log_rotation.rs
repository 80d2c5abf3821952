//! Size-based rotation for the service log.
//!
//! The service manager appends the daemon's stdout/stderr to `daemon.log`
//! and holds that handle for the life of the process, so the live file is
//! copied to `daemon.log.1` and truncated in place rather than renamed.
//! Older copies shift `daemon.log.1 -> daemon.log.2 -> ... -> daemon.log.<keep>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default rotation threshold (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of rotated copies kept.
pub const MAX_ROTATED_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_LOG_BYTES,
            keep: MAX_ROTATED_FILES,
        }
    }
}

impl RotationPolicy {
    /// Rotate `log` if it has reached `max_bytes`.
    ///
    /// Returns `Ok(false)` when the file is under the threshold or absent.
    pub fn rotate(&self, log: &Path) -> io::Result<bool> {
        let size = match fs::metadata(log) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if size < self.max_bytes || self.keep == 0 {
            return Ok(false);
        }

        let oldest = numbered(log, self.keep);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.keep).rev() {
            let src = numbered(log, n);
            if src.exists() {
                fs::rename(&src, numbered(log, n + 1))?;
            }
        }
        fs::copy(log, numbered(log, 1))?;
        fs::OpenOptions::new().write(true).open(log)?.set_len(0)?;
        Ok(true)
    }
}

/// Rotate with the default policy, logging instead of failing.
pub fn rotate_quietly(log: &Path) {
    match RotationPolicy::default().rotate(log) {
        Ok(true) => tracing::info!(path = %log.display(), "daemon log rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %log.display(), error = %err, "log rotation failed"),
    }
}

/// `daemon.log` -> `daemon.log.<n>`.
fn numbered(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("daemon.log");
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMALL: RotationPolicy = RotationPolicy {
        max_bytes: 64,
        keep: 3,
    };

    fn fill(path: &Path, bytes: usize, marker: u8) {
        fs::write(path, vec![marker; bytes]).expect("write log");
    }

    #[test]
    fn small_file_is_left_in_place() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("daemon.log");
        fill(&log, 10, b'a');

        assert!(!SMALL.rotate(&log).expect("rotate"));
        assert!(!numbered(&log, 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().expect("dir");
        assert!(!SMALL.rotate(&dir.path().join("daemon.log")).expect("rotate"));
    }

    #[test]
    fn oversized_file_is_copied_to_dot_one_and_truncated() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("daemon.log");
        fill(&log, 100, b'a');

        assert!(SMALL.rotate(&log).expect("rotate"));
        assert_eq!(fs::metadata(&log).expect("live").len(), 0);
        assert_eq!(fs::read(numbered(&log, 1)).expect("backup"), vec![b'a'; 100]);
    }

    #[test]
    fn repeated_rotation_keeps_at_most_keep_copies() {
        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("daemon.log");

        for marker in [b'1', b'2', b'3', b'4', b'5'] {
            fill(&log, 100, marker);
            SMALL.rotate(&log).expect("rotate");
        }

        assert_eq!(fs::read(numbered(&log, 1)).expect(".1")[0], b'5');
        assert_eq!(fs::read(numbered(&log, 3)).expect(".3")[0], b'3');
        assert!(!numbered(&log, 4).exists(), "only {} copies kept", SMALL.keep);
    }

    #[test]
    fn writer_holding_the_log_open_keeps_writing_to_the_live_file() {
        use std::io::Write;

        let dir = TempDir::new().expect("dir");
        let log = dir.path().join("daemon.log");
        let mut writer = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log)
            .expect("open log");

        writer.write_all(&[b'a'; 100]).expect("write");
        assert!(SMALL.rotate(&log).expect("first rotation"));
        writer.write_all(&[b'b'; 500]).expect("write");

        assert_eq!(fs::metadata(&log).expect("live").len(), 500);
        assert_eq!(fs::read(numbered(&log, 1)).expect(".1"), vec![b'a'; 100]);

        assert!(SMALL.rotate(&log).expect("second rotation"));
        writer.write_all(&[b'c'; 10]).expect("write");

        assert_eq!(fs::read(&log).expect("live"), vec![b'c'; 10]);
        assert_eq!(fs::read(numbered(&log, 1)).expect(".1"), vec![b'b'; 500]);
        assert_eq!(fs::read(numbered(&log, 2)).expect(".2"), vec![b'a'; 100]);
    }
}
