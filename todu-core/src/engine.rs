//! Collaborator traits driven by the background daemon.
//!
//! The daemon owns scheduling, backoff and status; everything behind these
//! traits (reconciliation, REST clients, plugin field mapping, RRULE
//! expansion, report rendering) lives elsewhere. Every call receives the
//! daemon's cancellation token; implementations decide how promptly to honor it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::types::{SyncOptions, SyncResult, TemplateRunSummary};

/// Runs one reconciliation pass between the central store and external trackers.
#[async_trait]
pub trait SyncEngine: Send + Sync {
    async fn sync(
        &self,
        cancel: &CancellationToken,
        options: &SyncOptions,
    ) -> Result<SyncResult, EngineError>;
}

/// Creates task instances for recurring templates that have come due.
#[async_trait]
pub trait RecurringProcessor: Send + Sync {
    async fn process_due(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TemplateRunSummary, EngineError>;
}

/// Writes the journal for `date` under `reports_path`, returning the file written.
#[async_trait]
pub trait JournalExporter: Send + Sync {
    async fn export_journal(
        &self,
        cancel: &CancellationToken,
        date: NaiveDate,
        reports_path: &Path,
    ) -> Result<PathBuf, EngineError>;
}
