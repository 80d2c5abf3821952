//! Process bridge to the external sync engine.
//!
//! The daemon only knows the collaborator traits from `todu_core::engine`.
//! `ProcessEngine` satisfies all three by running the configured engine
//! executable and decoding its JSON output:
//!
//! ```text
//! <program> [args...] sync --format json [--project <id>]... [--system <id>] [--dry-run] [--strategy <s>]
//! <program> [args...] template process-due --format json
//! <program> [args...] journal export --date YYYY-MM-DD --output <dir>
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use todu_core::{
    Config, EngineError, JournalExporter, RecurringProcessor, SyncEngine, SyncOptions, SyncResult,
    TemplateRunSummary,
};

#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.engine.program).with_args(config.engine.args.clone())
    }

    /// Arguments passed before every subcommand.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Run `<program> <args> <subcommand...>`; stdout on success.
    async fn run(
        &self,
        cancel: &CancellationToken,
        subcommand: Vec<String>,
    ) -> Result<Vec<u8>, EngineError> {
        let program = self.program.display().to_string();
        tracing::debug!(%program, args = ?subcommand, "invoking sync engine");

        let child = Command::new(&self.program)
            .args(&self.args)
            .args(&subcommand)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Other(format!("failed to run {program}: {e}")))?;

        // Dropping the child on cancellation kills it.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        if !output.status.success() {
            return Err(EngineError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// `sync --format json` plus one flag per populated option.
pub fn sync_arguments(options: &SyncOptions) -> Vec<String> {
    let mut args = vec!["sync".to_string(), "--format".to_string(), "json".to_string()];
    for project in &options.project_ids {
        args.push("--project".to_string());
        args.push(project.clone());
    }
    if let Some(system) = &options.system_id {
        args.push("--system".to_string());
        args.push(system.clone());
    }
    if options.dry_run {
        args.push("--dry-run".to_string());
    }
    if let Some(strategy) = options.strategy {
        args.push("--strategy".to_string());
        args.push(strategy.to_string());
    }
    args
}

#[async_trait]
impl SyncEngine for ProcessEngine {
    async fn sync(
        &self,
        cancel: &CancellationToken,
        options: &SyncOptions,
    ) -> Result<SyncResult, EngineError> {
        let stdout = self.run(cancel, sync_arguments(options)).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

#[async_trait]
impl RecurringProcessor for ProcessEngine {
    async fn process_due(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TemplateRunSummary, EngineError> {
        let args = ["template", "process-due", "--format", "json"]
            .map(String::from)
            .to_vec();
        let stdout = self.run(cancel, args).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

#[async_trait]
impl JournalExporter for ProcessEngine {
    async fn export_journal(
        &self,
        cancel: &CancellationToken,
        date: NaiveDate,
        reports_path: &Path,
    ) -> Result<PathBuf, EngineError> {
        let args = vec![
            "journal".to_string(),
            "export".to_string(),
            "--date".to_string(),
            date.format("%Y-%m-%d").to_string(),
            "--output".to_string(),
            reports_path.display().to_string(),
        ];
        let stdout = self.run(cancel, args).await?;
        let written = String::from_utf8_lossy(&stdout).trim().to_string();
        if written.is_empty() {
            return Err(EngineError::Other(
                "journal export did not report a file".to_string(),
            ));
        }
        Ok(PathBuf::from(written))
    }
}
