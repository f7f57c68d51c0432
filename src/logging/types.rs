//! Core logging types: operation entries, status, and the [`Log`] trait.

/// Outcome of one component operation, kept for the run summary.
#[derive(Debug, Clone)]
pub struct OperationEntry {
    /// Label shown in the summary (e.g. `backup fish`).
    pub name: String,
    /// Final status of the operation.
    pub status: OperationStatus,
    /// Optional detail message (e.g., the error description).
    pub message: Option<String>,
}

/// Status of a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Operation completed successfully.
    Ok,
    /// Operation ran in dry-run mode; nothing was changed.
    DryRun,
    /// Operation stopped at a failed step.
    Failed,
}

impl OperationStatus {
    /// Summary marker.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::DryRun => "~",
            Self::Failed => "✗",
        }
    }

    /// ANSI colour for the summary line.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Ok => "\x1b[32m",
            Self::DryRun => "\x1b[37m",
            Self::Failed => "\x1b[31m",
        }
    }
}

/// Abstraction over logging backends.
///
/// Pipeline code logs through `&dyn Log` so tests can swap in a quiet
/// logger without a global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an operation result for the summary.
    fn record_result(&self, name: &str, status: OperationStatus, message: Option<&str>);
}
