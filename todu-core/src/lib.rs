//! todu core library: sync domain model, collaborator traits, configuration.
//!
//! - [`types`]: options and results exchanged with the sync engine
//! - [`engine`]: collaborator traits the daemon drives
//! - [`config`]: `~/.config/todu/config.yaml` loading
//! - [`error`]: [`ConfigError`], [`EngineError`]

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::Config;
pub use engine::{JournalExporter, RecurringProcessor, SyncEngine};
pub use error::{ConfigError, EngineError};
pub use types::{
    ProjectSyncResult, SyncOptions, SyncResult, SyncStrategy, SyncTotals, TemplateRunDetail,
    TemplateRunSummary,
};
