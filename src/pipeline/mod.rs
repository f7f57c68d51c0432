//! Backup and restore pipelines, one component at a time.
//!
//! Each operation owns a scratch directory for its whole lifetime and a
//! remote session from connect until transfer ends; both are released on
//! every exit path. Failures name the step they happened in.
pub mod backup;
mod context;
pub mod package_list;
pub mod restore;

pub use self::backup::backup;
pub use self::context::Context;
pub use self::restore::restore;

use std::path::Path;

use crate::error::{Operation, OperationError, Step, StepError};
use crate::fsutil;
use crate::logging::Log;
use crate::transport::RemoteSession;

/// How an operation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything was carried out.
    Completed,
    /// Only logged what would happen.
    DryRun,
}

type StepResult<T> = Result<T, (Step, StepError)>;

/// Tag a failure with the step it happened in.
trait AtStep<T> {
    fn at(self, step: Step) -> StepResult<T>;
}

impl<T, E: Into<StepError>> AtStep<T> for Result<T, E> {
    fn at(self, step: Step) -> StepResult<T> {
        self.map_err(|e| (step, e.into()))
    }
}

fn into_operation_error(
    operation: Operation,
    component: &str,
) -> impl FnOnce((Step, StepError)) -> OperationError + '_ {
    move |(step, source)| OperationError {
        operation,
        component: component.to_string(),
        step,
        source,
    }
}

/// Log size and SHA-256 of an archive.
fn log_digest(log: &dyn Log, label: &str, archive: &Path) {
    let size = std::fs::metadata(archive).map(|m| m.len()).unwrap_or(0);
    match fsutil::sha256_file(archive) {
        Ok(digest) => log.info(&format!("{label} ({size} bytes, sha256 {digest})")),
        Err(e) => log.warn(&format!("cannot hash {}: {e}", archive.display())),
    }
}

/// Remove scratch space now so a failure to do so is visible.
fn release(log: &dyn Log, scratch: tempfile::TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log.warn(&format!("cannot remove scratch space {}: {e}", path.display()));
    }
}

/// Close `session`, logging instead of failing: the transfer result has
/// already been decided.
fn close_session(log: &dyn Log, mut session: Box<dyn RemoteSession>) {
    if let Err(e) = session.close() {
        log.warn(&format!("closing remote session: {e}"));
    }
}
