//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, OperationEntry, OperationStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) mirrors every
/// event into `$XDG_CACHE_HOME/dotbackup/<command>.log`.
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<OperationEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger for `command`.
    ///
    /// Only stores the log file path for the summary; the file itself is
    /// owned by the subscriber's file layer.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Create a logger that reports `log_file` in its summary.
    #[must_use]
    pub const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<OperationEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record an operation result for the summary.
    pub fn record_result(&self, name: &str, status: OperationStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(OperationEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed operations.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        Tally::of(&self.entries()).failed
    }

    /// Print one line per component operation, then the totals and the log
    /// file location.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        self.stage("Summary");
        for entry in &entries {
            let detail = entry
                .message
                .as_deref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            let status = entry.status;
            self.info(&format!(
                "{}{} {}{detail}\x1b[0m",
                status.color(),
                status.icon(),
                entry.name
            ));
        }

        let tally = Tally::of(&entries);
        self.info(&format!(
            "{} component(s): {}{} ok\x1b[0m, {}{} dry-run\x1b[0m, {}{} failed\x1b[0m",
            entries.len(),
            OperationStatus::Ok.color(),
            tally.ok,
            OperationStatus::DryRun.color(),
            tally.dry_run,
            OperationStatus::Failed.color(),
            tally.failed,
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

/// Per-status counts over recorded entries.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    ok: usize,
    dry_run: usize,
    failed: usize,
}

impl Tally {
    fn of(entries: &[OperationEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut tally, entry| {
            match entry.status {
                OperationStatus::Ok => tally.ok += 1,
                OperationStatus::DryRun => tally.dry_run += 1,
                OperationStatus::Failed => tally.failed += 1,
            }
            tally
        })
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_result(&self, name: &str, status: OperationStatus, message: Option<&str>) {
        self.record_result(name, status, message);
    }
}
