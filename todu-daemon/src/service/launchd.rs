use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ensure_dir, run_checked, CommandRunner, ServiceDescriptor, ServiceManager};
use crate::error::{io_err, DaemonError};
use crate::paths::{launch_agents_dir, launchd_plist_path, logs_dir, LAUNCHD_LABEL};
use crate::scheduler::DaemonConfig;

const LAUNCHCTL: &str = "launchctl";

/// Generate a launchd agent plist for the todu daemon.
pub fn render_plist(descriptor: &ServiceDescriptor) -> String {
    let arguments = descriptor
        .program_arguments()
        .iter()
        .map(|arg| format!("    <string>{}</string>", xml_escape(arg)))
        .collect::<Vec<_>>()
        .join("\n");

    let home = descriptor.home.display().to_string();
    let mut environment = vec![format!(
        "    <key>HOME</key>\n    <string>{}</string>",
        xml_escape(&home)
    )];
    environment.extend(descriptor.plugin_env.iter().map(|(key, value)| {
        format!(
            "    <key>{}</key>\n    <string>{}</string>",
            xml_escape(key),
            xml_escape(value)
        )
    }));

    let log = xml_escape(&descriptor.log_path.display().to_string());

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{arguments}
  </array>
  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
  <key>WorkingDirectory</key>
  <string>{home}</string>
  <key>EnvironmentVariables</key>
  <dict>
{environment}
  </dict>
  <key>StandardOutPath</key>
  <string>{log}</string>
  <key>StandardErrorPath</key>
  <string>{log}</string>
</dict>
</plist>
"#,
        label = LAUNCHD_LABEL,
        arguments = arguments,
        home = xml_escape(&home),
        environment = environment.join("\n"),
        log = log,
    )
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// `launchctl` backend (macOS user agent).
pub struct LaunchdManager {
    home: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl LaunchdManager {
    pub fn new(home: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            home: home.to_path_buf(),
            runner,
        }
    }

    /// Install from an explicit descriptor instead of the running executable.
    pub fn install_with(&self, descriptor: &ServiceDescriptor) -> Result<(), DaemonError> {
        ensure_dir(&launch_agents_dir(&self.home))?;
        ensure_dir(&logs_dir(&self.home))?;

        let plist = self.definition_path();
        fs::write(&plist, render_plist(descriptor)).map_err(|e| io_err(&plist, e))?;

        if self.is_loaded() {
            self.unload_quietly();
        }
        self.load()?;
        tracing::info!(plist = %plist.display(), "launchd agent installed");
        Ok(())
    }

    /// `launchctl list <label>` succeeds only for a loaded agent.
    fn is_loaded(&self) -> bool {
        match self.runner.run(LAUNCHCTL, &["list", LAUNCHD_LABEL]) {
            Ok(output) => output.success,
            Err(err) => {
                tracing::debug!(error = %err, "launchctl list failed");
                false
            }
        }
    }

    fn load(&self) -> Result<(), DaemonError> {
        let plist = self.definition_path().display().to_string();
        run_checked(self.runner.as_ref(), LAUNCHCTL, &["load", plist.as_str()]).map(|_| ())
    }

    fn unload(&self) -> Result<(), DaemonError> {
        let plist = self.definition_path().display().to_string();
        run_checked(self.runner.as_ref(), LAUNCHCTL, &["unload", plist.as_str()]).map(|_| ())
    }

    fn unload_quietly(&self) {
        if let Err(err) = self.unload() {
            tracing::debug!(error = %err, "launchctl unload failed");
        }
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

impl ServiceManager for LaunchdManager {
    fn install(&self, config: &DaemonConfig) -> Result<(), DaemonError> {
        config.interval()?;
        let descriptor = ServiceDescriptor::capture(&self.home)?;
        self.install_with(&descriptor)
    }

    fn uninstall(&self) -> Result<(), DaemonError> {
        let plist = self.definition_path();
        if !plist.exists() {
            return Ok(());
        }
        if self.is_loaded() {
            self.unload_quietly();
        }
        fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
        tracing::info!(plist = %plist.display(), "launchd agent removed");
        Ok(())
    }

    fn start(&self) -> Result<(), DaemonError> {
        self.require_installed()?;
        if self.is_loaded() {
            return Ok(());
        }
        self.load()
    }

    fn stop(&self) -> Result<(), DaemonError> {
        self.require_installed()?;
        if !self.is_loaded() {
            return Ok(());
        }
        self.unload()
    }

    fn is_installed(&self) -> bool {
        self.definition_path().exists()
    }

    fn definition_path(&self) -> PathBuf {
        launchd_plist_path(&self.home)
    }
}
