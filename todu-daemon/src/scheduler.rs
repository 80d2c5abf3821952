use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use todu_core::{Config, JournalExporter, RecurringProcessor, SyncEngine, SyncOptions, SyncResult};

use crate::backoff::Backoff;
use crate::daily;
use crate::error::{io_err, DaemonError};
use crate::log_rotation;
use crate::shutdown::{LoopState, Shutdown};
use crate::status::{Status, StatusStore};

/// Settings the scheduler consumes from the user configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Duration string, e.g. `"5m"`.
    pub interval: String,
    /// Project allowlist; empty means all.
    pub projects: Vec<String>,
    pub recurring_enabled: bool,
    pub reports_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DaemonConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.daemon.interval.clone(),
            projects: config.daemon.projects.clone(),
            recurring_enabled: config.recurring.enabled,
            reports_path: config.reports.path.clone(),
        }
    }
}

impl DaemonConfig {
    pub fn with_interval(interval: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Result<Duration, DaemonError> {
        parse_interval(&self.interval)
    }
}

/// Parse a sync interval such as `"5m"`, `"90s"` or `"100ms"`. Zero is rejected.
pub fn parse_interval(value: &str) -> Result<Duration, DaemonError> {
    let invalid = |reason: String| DaemonError::InvalidInterval {
        value: value.to_string(),
        reason,
    };
    let interval = humantime::parse_duration(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if interval.is_zero() {
        return Err(invalid("interval must be greater than zero".to_string()));
    }
    Ok(interval)
}

/// Periodic sync scheduler.
///
/// `start` runs an immediate sync, then one sync per timer fire until it is
/// cancelled, signalled, or asked to [`stop`](Daemon::stop). A failed cycle
/// stretches the next wait via [`Backoff`]; every outcome is persisted to the
/// [`StatusStore`].
pub struct Daemon {
    engine: Arc<dyn SyncEngine>,
    recurring: Option<Arc<dyn RecurringProcessor>>,
    exporter: Option<Arc<dyn JournalExporter>>,
    config: DaemonConfig,
    options: SyncOptions,
    store: StatusStore,
    log_file: Option<PathBuf>,
    handle_signals: bool,
    shutdown: Shutdown,
    status: Mutex<Status>,
}

impl Daemon {
    pub fn new(engine: Arc<dyn SyncEngine>, config: DaemonConfig, store: StatusStore) -> Self {
        Self {
            engine,
            recurring: None,
            exporter: None,
            config,
            options: SyncOptions::default(),
            store,
            log_file: None,
            handle_signals: true,
            shutdown: Shutdown::new(),
            status: Mutex::new(Status::default()),
        }
    }

    pub fn with_recurring(mut self, processor: Arc<dyn RecurringProcessor>) -> Self {
        self.recurring = Some(processor);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn JournalExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Base options for every run; the configured project list still applies.
    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Rotate this log file at the start of every cycle.
    pub fn with_log_rotation(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    /// Do not listen for SIGINT/SIGTERM; only `cancel` and `stop` end the loop.
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    pub fn state(&self) -> LoopState {
        self.shutdown.state()
    }

    pub async fn status(&self) -> Status {
        self.status.lock().await.clone()
    }

    /// Ask the loop to stop and wait until it has persisted its final status.
    ///
    /// Safe to call repeatedly and from several tasks. An in-flight sync is
    /// allowed to finish first.
    pub async fn stop(&self) -> Result<(), DaemonError> {
        self.shutdown.stop().await
    }

    /// Build a multi-threaded runtime and run [`start`](Daemon::start) on it.
    pub fn start_blocking(&self, cancel: CancellationToken) -> Result<(), DaemonError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| io_err("tokio-runtime", e))?;
        runtime.block_on(self.start(cancel))
    }

    /// Run the scheduler until cancelled, signalled, or stopped.
    ///
    /// Returns `Err(Cancelled)` when `cancel` fires, `Ok(())` on a signal or
    /// [`stop`](Daemon::stop). A malformed interval fails before anything is
    /// persisted.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), DaemonError> {
        let interval = self.config.interval()?;
        self.shutdown.begin()?;

        let pid = std::process::id();
        {
            let mut status = self.status.lock().await;
            status.mark_running(pid);
            self.store.write(&status);
        }
        tracing::info!(
            pid,
            interval = %humantime::format_duration(interval),
            projects = ?self.config.projects,
            "daemon started",
        );

        let result = self.run_loop(&cancel, interval).await;
        self.exit().await;
        result
    }

    async fn run_loop(
        &self,
        cancel: &CancellationToken,
        interval: Duration,
    ) -> Result<(), DaemonError> {
        let mut signals = Signals::install(self.handle_signals)?;
        let mut backoff = Backoff::new(interval);

        let deadline = self.run_cycle(cancel, &mut backoff).await;
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.shutdown.stopping();
                    tracing::info!("context cancelled, stopping daemon");
                    return Err(DaemonError::Cancelled);
                }
                signal = signals.recv() => {
                    self.shutdown.stopping();
                    tracing::info!(signal, "received signal, stopping daemon");
                    return Ok(());
                }
                _ = self.shutdown.stop_requested() => {
                    self.shutdown.stopping();
                    tracing::info!("stop requested, stopping daemon");
                    return Ok(());
                }
                _ = &mut timer => {
                    let deadline = self.run_cycle(cancel, &mut backoff).await;
                    timer.as_mut().reset(deadline);
                }
            }
        }
    }

    /// One sync cycle. Returns the instant the next one is due.
    ///
    /// The deadline is fixed when the sync finishes, so recurring processing
    /// runs inside the wait.
    async fn run_cycle(&self, cancel: &CancellationToken, backoff: &mut Backoff) -> Instant {
        if let Some(log_file) = &self.log_file {
            log_rotation::rotate_quietly(log_file);
        }

        let previous = self.status.lock().await.last_sync_time;
        self.export_journal_if_new_day(cancel, previous, Local::now()).await;

        let options = self.options.narrowed_to(&self.config.projects);
        let started = Instant::now();
        let outcome = self.engine.sync(cancel, &options).await;
        let failure = failure_message(&outcome);

        let delay = match failure {
            None => backoff.record_success(),
            Some(_) => backoff.record_failure(),
        };

        let deadline = Instant::now() + delay;
        let finished = Utc::now();
        {
            let mut status = self.status.lock().await;
            status.last_sync_time = Some(finished);
            status.next_sync_time = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| finished.checked_add_signed(d));
            match &failure {
                None => {
                    status.last_sync_error = None;
                    status.error_count = 0;
                }
                Some(message) => {
                    status.last_sync_error = Some(message.clone());
                    status.error_count = status.error_count.saturating_add(1);
                }
            }
            self.store.write(&status);
        }

        match (&outcome, &failure) {
            (Ok(result), None) => tracing::info!(
                created = result.totals.created,
                updated = result.totals.updated,
                skipped = result.totals.skipped,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                next_in = %humantime::format_duration(delay),
                "sync completed",
            ),
            (_, Some(message)) => {
                if let Ok(result) = &outcome {
                    for project in result.failed_projects() {
                        tracing::warn!(
                            project = %project.project_id,
                            errors = project.errors,
                            "project sync reported errors",
                        );
                    }
                }
                tracing::error!(
                    error = %message,
                    failures = backoff.failures(),
                    retry_in = %humantime::format_duration(delay),
                    "sync failed",
                );
            }
            (Err(_), None) => {}
        }

        if failure.is_none() {
            self.process_recurring(cancel).await;
        }
        deadline
    }

    async fn export_journal_if_new_day(
        &self,
        cancel: &CancellationToken,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Local>,
    ) {
        let previous = previous.map(|t| t.with_timezone(&Local));
        if !daily::is_new_day(previous.as_ref(), &now) {
            return;
        }
        let Some(exporter) = &self.exporter else {
            tracing::debug!("no journal exporter attached, skipping daily export");
            return;
        };
        let Some(reports) = &self.config.reports_path else {
            tracing::debug!("reports path not configured, skipping daily export");
            return;
        };

        let date = daily::previous_day(&now);
        match exporter.export_journal(cancel, date, reports).await {
            Ok(path) => tracing::info!(%date, path = %path.display(), "journal exported"),
            Err(err) => tracing::warn!(%date, error = %err, "journal export failed"),
        }
    }

    async fn process_recurring(&self, cancel: &CancellationToken) {
        if !self.config.recurring_enabled {
            return;
        }
        let Some(processor) = &self.recurring else {
            tracing::debug!("recurring tasks enabled but no processor attached");
            return;
        };
        match processor.process_due(cancel).await {
            Ok(summary) => tracing::info!(
                processed = summary.processed,
                tasks_created = summary.tasks_created,
                skipped = summary.skipped,
                failed = summary.failed,
                "recurring templates processed",
            ),
            Err(err) => tracing::warn!(error = %err, "recurring template processing failed"),
        }
    }

    /// Exit sequence shared by every shutdown path.
    async fn exit(&self) {
        self.shutdown.stopping();
        {
            let mut status = self.status.lock().await;
            status.mark_stopped();
            self.store.write(&status);
        }
        self.shutdown.finish();
        tracing::info!("daemon stopped");
    }
}

fn failure_message(outcome: &Result<SyncResult, todu_core::EngineError>) -> Option<String> {
    match outcome {
        Ok(result) if !result.has_errors() => None,
        Ok(result) => Some(format!(
            "{} project(s) reported {} error(s)",
            result.failed_projects().count(),
            result.totals.errors
        )),
        Err(err) => Some(err.to_string()),
    }
}

/// OS termination signals, or nothing when disabled.
struct Signals {
    #[cfg(unix)]
    streams: Option<(tokio::signal::unix::Signal, tokio::signal::unix::Signal)>,
    #[cfg(not(unix))]
    enabled: bool,
}

impl Signals {
    #[cfg(unix)]
    fn install(enabled: bool) -> Result<Self, DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        if !enabled {
            return Ok(Self { streams: None });
        }
        let interrupt = signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT handler", e))?;
        let terminate =
            signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
        Ok(Self {
            streams: Some((interrupt, terminate)),
        })
    }

    #[cfg(not(unix))]
    fn install(enabled: bool) -> Result<Self, DaemonError> {
        Ok(Self { enabled })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        let Some((interrupt, terminate)) = self.streams.as_mut() else {
            return std::future::pending().await;
        };
        tokio::select! {
            Some(()) = interrupt.recv() => "SIGINT",
            Some(()) = terminate.recv() => "SIGTERM",
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if !self.enabled {
            return std::future::pending().await;
        }
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(err) => {
                tracing::warn!(error = %err, "ctrl-c handler failed");
                std::future::pending().await
            }
        }
    }
}

/// Install the global `tracing` subscriber (`RUST_LOG`, default `info`).
///
/// `TODU_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("TODU_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}
