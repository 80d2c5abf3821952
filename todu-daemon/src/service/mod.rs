//! Native service registration for the daemon.
//!
//! Each backend renders a service definition that re-executes this binary as
//! `<exe> daemon start`, writes it to the platform's per-user location, and
//! drives the platform tool (`systemctl --user`, `launchctl`) through a
//! [`CommandRunner`] so tests can substitute a fake.

mod launchd;
mod systemd;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::error::{io_err, DaemonError};
use crate::paths::log_path;
use crate::scheduler::DaemonConfig;

pub use launchd::{render_plist, LaunchdManager};
pub use systemd::{render_unit, SystemdManager};

/// Environment variables with this prefix are copied into the service definition.
pub const PLUGIN_ENV_PREFIX: &str = "TODU_PLUGIN_";

/// Lifecycle operations on the OS-managed daemon.
pub trait ServiceManager {
    /// Write (or rewrite) the service definition and register it.
    fn install(&self, config: &DaemonConfig) -> Result<(), DaemonError>;
    /// Stop, deregister, and delete the definition. Not-installed is a no-op.
    fn uninstall(&self) -> Result<(), DaemonError>;
    fn start(&self) -> Result<(), DaemonError>;
    fn stop(&self) -> Result<(), DaemonError>;
    fn is_installed(&self) -> bool;
    /// Where the rendered definition lives.
    fn definition_path(&self) -> PathBuf;
}

/// Everything a service definition is rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub executable: PathBuf,
    pub log_path: PathBuf,
    pub home: PathBuf,
    pub plugin_env: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// Snapshot the running executable and `TODU_PLUGIN_*` variables.
    pub fn capture(home: &Path) -> Result<Self, DaemonError> {
        let executable =
            std::env::current_exe().map_err(|e| io_err("current executable", e))?;
        Ok(Self::from_parts(executable, home, std::env::vars()))
    }

    pub fn from_parts(
        executable: impl Into<PathBuf>,
        home: &Path,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let plugin_env = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with(PLUGIN_ENV_PREFIX))
            .collect();
        Self {
            executable: executable.into(),
            log_path: log_path(home),
            home: home.to_path_buf(),
            plugin_env,
        }
    }

    /// `[<exe>, "daemon", "start"]`
    pub fn program_arguments(&self) -> Vec<String> {
        vec![
            self.executable.display().to_string(),
            "daemon".to_string(),
            "start".to_string(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Shell-out layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    /// stdout followed by stderr, trimmed.
    pub output: String,
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| io_err(program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{} {}", stdout.trim(), stderr.trim());
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            output: combined.trim().to_string(),
        })
    }
}

/// Run and turn a non-zero exit into [`DaemonError::Command`].
fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput, DaemonError> {
    let output = runner.run(program, args)?;
    if output.success {
        return Ok(output);
    }
    Err(DaemonError::Command {
        program: program.to_string(),
        args: args.join(" "),
        output: format!("{} ({})", output.output, output.status),
    })
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Backend for `os` (`std::env::consts::OS` naming).
pub fn for_platform(
    os: &str,
    home: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn ServiceManager>, DaemonError> {
    match os {
        "linux" => Ok(Box::new(SystemdManager::new(home, runner))),
        "macos" => Ok(Box::new(LaunchdManager::new(home, runner))),
        other => Err(DaemonError::UnsupportedPlatform(other.to_string())),
    }
}

/// Backend for the running OS, shelling out for real.
pub fn detect(home: &Path) -> Result<Box<dyn ServiceManager>, DaemonError> {
    for_platform(std::env::consts::OS, home, Arc::new(SystemCommandRunner))
}

fn ensure_dir(dir: &Path) -> Result<(), DaemonError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Records every invocation; replies from a queue, defaulting to success.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<(String, CommandOutput)>>,
    }

    impl FakeRunner {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Next invocation whose command line starts with `prefix` gets `success`.
        pub fn reply(&self, prefix: &str, success: bool, output: &str) {
            self.replies.lock().expect("replies").push_back((
                prefix.to_string(),
                CommandOutput {
                    success,
                    status: if success { "exit status: 0" } else { "exit status: 1" }.to_string(),
                    output: output.to_string(),
                },
            ));
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().expect("calls").push(line.clone());

            let mut replies = self.replies.lock().expect("replies");
            if let Some(idx) = replies.iter().position(|(prefix, _)| line.starts_with(prefix)) {
                if let Some((_, reply)) = replies.remove(idx) {
                    return Ok(reply);
                }
            }
            Ok(CommandOutput {
                success: true,
                status: "exit status: 0".to_string(),
                output: String::new(),
            })
        }
    }

    pub fn descriptor(home: &Path) -> ServiceDescriptor {
        ServiceDescriptor::from_parts(
            "/opt/todu/bin/todu",
            home,
            [
                ("TODU_PLUGIN_GITHUB_TOKEN".to_string(), "ghp_secret".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ],
        )
    }
}
