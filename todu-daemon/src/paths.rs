use std::path::{Path, PathBuf};

pub use todu_core::config::config_dir_at;

pub const SYSTEMD_UNIT: &str = "todu-daemon.service";
pub const LAUNCHD_LABEL: &str = "dev.todu.daemon";

pub const STATUS_FILE: &str = "daemon-status.json";
pub const DAEMON_LOG: &str = "daemon.log";

pub fn status_path(home: &Path) -> PathBuf {
    config_dir_at(home).join(STATUS_FILE)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    config_dir_at(home).join("logs")
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_LOG)
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn systemd_unit_path(home: &Path) -> PathBuf {
    systemd_user_dir(home).join(SYSTEMD_UNIT)
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{LAUNCHD_LABEL}.plist"))
}
