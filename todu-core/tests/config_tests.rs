//! Config file loading: defaults, partial files, parse errors.

use assert_fs::prelude::*;
use rstest::rstest;
use std::path::PathBuf;
use todu_core::{config, ConfigError};

#[test]
fn missing_file_yields_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = config::load_file_at(home.path()).expect("load");
    assert_eq!(config, todu_core::Config::default());
}

#[test]
fn empty_file_yields_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".config/todu/config.yaml")
        .write_str("\n")
        .expect("write");
    let config = config::load_file_at(home.path()).expect("load");
    assert_eq!(config, todu_core::Config::default());
}

#[test]
fn full_file_is_parsed() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".config/todu/config.yaml")
        .write_str(
            "daemon:\n  interval: 90s\n  projects: [work, home]\nrecurring:\n  enabled: true\nreports:\n  path: /srv/reports\nengine:\n  program: /usr/local/bin/todu-sync\n  args: [--profile, work]\n",
        )
        .expect("write");

    let config = config::load_file_at(home.path()).expect("load");
    assert_eq!(config.daemon.interval, "90s");
    assert_eq!(config.daemon.projects, vec!["work", "home"]);
    assert!(config.recurring.enabled);
    assert_eq!(config.reports.path, Some(PathBuf::from("/srv/reports")));
    assert_eq!(
        config.engine.program,
        PathBuf::from("/usr/local/bin/todu-sync")
    );
    assert_eq!(config.engine.args, vec!["--profile", "work"]);
}

#[rstest]
#[case::only_interval("daemon:\n  interval: 1h\n", "1h", false)]
#[case::only_recurring("recurring:\n  enabled: true\n", "5m", true)]
#[case::unknown_section("plugins:\n  github: {}\n", "5m", false)]
fn partial_files_fill_in_defaults(
    #[case] yaml: &str,
    #[case] interval: &str,
    #[case] recurring: bool,
) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".config/todu/config.yaml")
        .write_str(yaml)
        .expect("write");

    let config = config::load_file_at(home.path()).expect("load");
    assert_eq!(config.daemon.interval, interval);
    assert_eq!(config.recurring.enabled, recurring);
}

#[test]
fn malformed_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".config/todu/config.yaml")
        .write_str("daemon: [unclosed\n  interval: : :")
        .expect("write");

    let err = config::load_file_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(
        err.to_string().contains("config.yaml"),
        "must contain file path, got: {err}"
    );
}

#[test]
fn config_path_lives_under_dot_config() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::config_path_at(home.path());
    assert!(path.ends_with(".config/todu/config.yaml"));
}
