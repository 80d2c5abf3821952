use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ensure_dir, run_checked, CommandRunner, ServiceDescriptor, ServiceManager};
use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, systemd_unit_path, systemd_user_dir, SYSTEMD_UNIT};
use crate::scheduler::DaemonConfig;

const SYSTEMCTL: &str = "systemctl";

/// Render a systemd user unit that runs `<exe> daemon start`.
pub fn render_unit(descriptor: &ServiceDescriptor) -> String {
    let exec = quote(&descriptor.executable.display().to_string());
    let log = descriptor.log_path.display().to_string();
    let home = descriptor.home.display().to_string();

    let mut environment = vec![format!("Environment={}", quote(&format!("HOME={home}")))];
    environment.extend(
        descriptor
            .plugin_env
            .iter()
            .map(|(key, value)| format!("Environment={}", quote(&format!("{key}={value}")))),
    );

    format!(
        r#"[Unit]
Description=todu background sync daemon
After=network-online.target

[Service]
Type=simple
ExecStart={exec} daemon start
Restart=on-failure
RestartSec=10
WorkingDirectory={home}
{environment}
StandardOutput=append:{log}
StandardError=append:{log}

[Install]
WantedBy=default.target
"#,
        exec = exec,
        home = escape_specifiers(&home),
        environment = environment.join("\n"),
        log = escape_specifiers(&log),
    )
}

/// Double-quote for systemd, escaping `\`, `"` and `%` specifiers.
fn quote(value: &str) -> String {
    let escaped = escape_specifiers(value)
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn escape_specifiers(value: &str) -> String {
    value.replace('%', "%%")
}

/// `systemctl --user` backend (Linux).
pub struct SystemdManager {
    home: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl SystemdManager {
    pub fn new(home: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            home: home.to_path_buf(),
            runner,
        }
    }

    /// Install from an explicit descriptor instead of the running executable.
    pub fn install_with(&self, descriptor: &ServiceDescriptor) -> Result<(), DaemonError> {
        ensure_dir(&systemd_user_dir(&self.home))?;
        ensure_dir(&logs_dir(&self.home))?;

        let unit = self.definition_path();
        fs::write(&unit, render_unit(descriptor)).map_err(|e| io_err(&unit, e))?;

        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", SYSTEMD_UNIT])?;
        tracing::info!(unit = %unit.display(), "systemd user unit installed");
        Ok(())
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), DaemonError> {
        let mut full = vec!["--user"];
        full.extend_from_slice(args);
        run_checked(self.runner.as_ref(), SYSTEMCTL, &full).map(|_| ())
    }

    fn require_installed(&self) -> Result<(), DaemonError> {
        if self.is_installed() {
            return Ok(());
        }
        Err(DaemonError::ServiceNotInstalled {
            path: self.definition_path(),
        })
    }
}

impl ServiceManager for SystemdManager {
    fn install(&self, config: &DaemonConfig) -> Result<(), DaemonError> {
        config.interval()?;
        let descriptor = ServiceDescriptor::capture(&self.home)?;
        self.install_with(&descriptor)
    }

    fn uninstall(&self) -> Result<(), DaemonError> {
        let unit = self.definition_path();
        if !unit.exists() {
            return Ok(());
        }

        if let Err(err) = self.systemctl(&["stop", SYSTEMD_UNIT]) {
            tracing::debug!(error = %err, "systemctl stop failed during uninstall");
        }
        if let Err(err) = self.systemctl(&["disable", SYSTEMD_UNIT]) {
            tracing::debug!(error = %err, "systemctl disable failed during uninstall");
        }
        fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
        self.systemctl(&["daemon-reload"])?;
        tracing::info!(unit = %unit.display(), "systemd user unit removed");
        Ok(())
    }

    fn start(&self) -> Result<(), DaemonError> {
        self.require_installed()?;
        self.systemctl(&["start", SYSTEMD_UNIT])
    }

    fn stop(&self) -> Result<(), DaemonError> {
        self.require_installed()?;
        self.systemctl(&["stop", SYSTEMD_UNIT])
    }

    fn is_installed(&self) -> bool {
        self.definition_path().exists()
    }

    fn definition_path(&self) -> PathBuf {
        systemd_unit_path(&self.home)
    }
}
