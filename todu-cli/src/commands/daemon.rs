//! `todu daemon`: foreground sync loop and native service management.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;

use todu_core::config;
use todu_daemon::paths::log_path;
use todu_daemon::status::process_alive;
use todu_daemon::{init_tracing, service, Daemon, DaemonConfig, Status, StatusStore};

use crate::engine::ProcessEngine;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the sync loop in the foreground (what the installed service runs).
    Start,
    /// Stop the service, or signal a foreground daemon.
    Stop,
    /// Show the last recorded daemon status.
    Status(DaemonStatusArgs),
    /// Install and start the daemon as a user service (systemd or launchd).
    Install,
    /// Stop and remove the user service.
    Uninstall,
    /// Stop then start the installed service.
    Restart,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
}

#[derive(Args, Debug)]
pub struct DaemonStatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => start(&home)?,
        DaemonCommand::Stop => stop(&home)?,
        DaemonCommand::Status(args) => status(&home, args.json)?,
        DaemonCommand::Install => {
            let config = config::load_at(&home).context("failed to load configuration")?;
            let manager = service::detect(&home)?;
            manager
                .install(&DaemonConfig::from(&config))
                .context("failed to install daemon service")?;
            manager.start().context("failed to start daemon service")?;
            println!(
                "installed daemon service: {}",
                manager.definition_path().display()
            );
        }
        DaemonCommand::Uninstall => {
            let manager = service::detect(&home)?;
            let was_installed = manager.is_installed();
            manager
                .uninstall()
                .context("failed to uninstall daemon service")?;
            if was_installed {
                println!("uninstalled daemon service");
            } else {
                println!("daemon service is not installed");
            }
        }
        DaemonCommand::Restart => {
            let manager = service::detect(&home)?;
            if !manager.is_installed() {
                bail!("daemon service is not installed; run `todu daemon install` first");
            }
            manager.stop().context("failed to stop daemon service")?;
            manager.start().context("failed to start daemon service")?;
            println!("daemon service restarted");
        }
        DaemonCommand::Logs(args) => {
            print_tail(&log_path(&home), args.lines).context("failed to read daemon log")?;
        }
    }

    Ok(())
}

fn start(home: &Path) -> Result<()> {
    let config = config::load_at(home).context("failed to load configuration")?;
    let daemon_config = DaemonConfig::from(&config);
    daemon_config
        .interval()
        .context("refusing to start with an invalid interval")?;

    let store = StatusStore::at_home(home);
    let current = store.read().context("failed to read daemon status")?;
    if let (true, Some(pid)) = (current.running, current.pid) {
        if pid != std::process::id() {
            bail!("daemon is already running (pid {pid})");
        }
    }

    init_tracing();
    let engine = Arc::new(ProcessEngine::from_config(&config));
    let daemon = Daemon::new(engine.clone(), daemon_config, store)
        .with_recurring(engine.clone())
        .with_exporter(engine)
        .with_log_rotation(log_path(home));

    daemon
        .start_blocking(CancellationToken::new())
        .context("daemon exited with error")
}

fn stop(home: &Path) -> Result<()> {
    if let Ok(manager) = service::detect(home) {
        if manager.is_installed() {
            manager.stop().context("failed to stop daemon service")?;
            println!("daemon service stopped");
            return Ok(());
        }
    }

    let status = StatusStore::at_home(home)
        .read()
        .context("failed to read daemon status")?;
    match (status.running, status.pid) {
        (true, Some(pid)) if process_alive(pid) => {
            terminate(pid)?;
            println!("sent stop signal to daemon (pid {pid})");
        }
        _ => println!("daemon is not running"),
    }
    Ok(())
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).with_context(|| format!("invalid pid {pid}"))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM)
        .with_context(|| format!("failed to signal daemon (pid {pid})"))
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    bail!("cannot signal a foreground daemon (pid {pid}) on this platform; stop it from its console")
}

#[derive(Serialize)]
struct StatusJson<'a> {
    #[serde(flatten)]
    status: &'a Status,
    installed: bool,
    status_file: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn status(home: &Path, json: bool) -> Result<()> {
    let store = StatusStore::at_home(home);
    let status = store.read().context("failed to read daemon status")?;
    let installed = service::detect(home)
        .map(|manager| manager.is_installed())
        .unwrap_or(false);

    if json {
        let payload = StatusJson {
            status: &status,
            installed,
            status_file: store.path().display().to_string(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to render daemon status JSON")?
        );
        return Ok(());
    }

    let state = if status.running {
        "running".green().bold()
    } else {
        "stopped".red().bold()
    };
    println!("{} {}", "todu daemon".bold(), state);

    let errors = if status.error_count > 0 {
        status.error_count.to_string().yellow().to_string()
    } else {
        status.error_count.to_string()
    };
    let rows = vec![
        StatusRow {
            field: "pid",
            value: status.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        },
        StatusRow {
            field: "service",
            value: if installed { "installed" } else { "not installed" }.to_string(),
        },
        StatusRow {
            field: "last sync",
            value: format_time(status.last_sync_time),
        },
        StatusRow {
            field: "next sync",
            value: format_time(status.next_sync_time),
        },
        StatusRow {
            field: "errors",
            value: errors,
        },
        StatusRow {
            field: "last error",
            value: status.last_sync_error.clone().unwrap_or_else(|| "-".to_string()),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "never".bright_black().to_string(),
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines);
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
