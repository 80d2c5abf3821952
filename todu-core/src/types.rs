//! Domain types exchanged between the daemon and its collaborators.
//!
//! All types are JSON (de)serializable; the process bridge in `todu-cli`
//! reads them straight off the engine's stdout.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Direction override for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    Pull,
    Push,
    Bidirectional,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Pull => write!(f, "pull"),
            SyncStrategy::Push => write!(f, "push"),
            SyncStrategy::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(format!(
                "unknown sync strategy '{other}'; expected: pull, push, bidirectional"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync input / output
// ---------------------------------------------------------------------------

/// Input to [`crate::SyncEngine::sync`]. Owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Restrict the run to these project IDs. Empty means every project.
    #[serde(default)]
    pub project_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SyncStrategy>,
}

impl SyncOptions {
    /// Copy of these options narrowed to `projects`; an empty list leaves the
    /// existing filter untouched.
    pub fn narrowed_to(&self, projects: &[String]) -> Self {
        let mut options = self.clone();
        if !projects.is_empty() {
            options.project_ids = projects.to_vec();
        }
        options
    }
}

/// Per-project outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSyncResult {
    pub project_id: String,
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub errors: usize,
}

/// Aggregate counters across all projects in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTotals {
    #[serde(default)]
    pub created: usize,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub errors: usize,
}

/// Output of [`crate::SyncEngine::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    #[serde(default)]
    pub projects: Vec<ProjectSyncResult>,
    #[serde(default)]
    pub totals: SyncTotals,
    #[serde(default)]
    pub duration_ms: u64,
}

impl SyncResult {
    /// Build a result from per-project rows, deriving the totals.
    pub fn from_projects(projects: Vec<ProjectSyncResult>, duration: Duration) -> Self {
        let totals = projects.iter().fold(SyncTotals::default(), |acc, p| SyncTotals {
            created: acc.created + p.created,
            updated: acc.updated + p.updated,
            skipped: acc.skipped + p.skipped,
            errors: acc.errors + p.errors,
        });
        Self {
            projects,
            totals,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0
    }

    /// Projects that reported at least one error.
    pub fn failed_projects(&self) -> impl Iterator<Item = &ProjectSyncResult> {
        self.projects.iter().filter(|p| p.errors > 0)
    }
}

// ---------------------------------------------------------------------------
// Recurring templates
// ---------------------------------------------------------------------------

/// One template handled by a recurring-task run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRunDetail {
    pub template_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Output of [`crate::RecurringProcessor::process_due`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRunSummary {
    #[serde(default)]
    pub processed: usize,
    #[serde(default)]
    pub tasks_created: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub details: Vec<TemplateRunDetail>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_replaces_projects_only_when_configured() {
        let base = SyncOptions {
            project_ids: vec!["inbox".to_string()],
            system_id: Some("github".to_string()),
            dry_run: true,
            strategy: Some(SyncStrategy::Pull),
        };

        let untouched = base.narrowed_to(&[]);
        assert_eq!(untouched, base);

        let narrowed = base.narrowed_to(&["work".to_string(), "home".to_string()]);
        assert_eq!(narrowed.project_ids, vec!["work", "home"]);
        assert_eq!(narrowed.system_id.as_deref(), Some("github"));
        assert!(narrowed.dry_run);
        assert_eq!(narrowed.strategy, Some(SyncStrategy::Pull));
    }

    #[test]
    fn totals_are_derived_from_projects() {
        let result = SyncResult::from_projects(
            vec![
                ProjectSyncResult {
                    project_id: "a".into(),
                    created: 2,
                    updated: 1,
                    skipped: 0,
                    errors: 0,
                },
                ProjectSyncResult {
                    project_id: "b".into(),
                    created: 0,
                    updated: 3,
                    skipped: 4,
                    errors: 1,
                },
            ],
            Duration::from_millis(1500),
        );
        assert_eq!(
            result.totals,
            SyncTotals {
                created: 2,
                updated: 4,
                skipped: 4,
                errors: 1
            }
        );
        assert!(result.has_errors());
        assert_eq!(result.duration(), Duration::from_millis(1500));
        let failed: Vec<_> = result.failed_projects().map(|p| p.project_id.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("PULL".parse::<SyncStrategy>(), Ok(SyncStrategy::Pull));
        assert_eq!(SyncStrategy::Bidirectional.to_string(), "bidirectional");
        assert!("sideways".parse::<SyncStrategy>().is_err());
    }
}
