//! Backup pipeline: validate, archive, upload.
use std::fs;
use std::io;
use std::path::Path;

use super::{
    AtStep as _, Context, Outcome, StepResult, close_session, into_operation_error, log_digest,
    package_list, release,
};
use crate::components::Component;
use crate::error::{Operation, OperationError, Step, StepError};
use crate::logging::OPERATION_SPAN;
use crate::transport::RemoteSession;

/// Archive `component` and upload it to the remote store.
///
/// # Errors
///
/// Returns an [`OperationError`] naming the step that failed. Scratch space
/// is removed and the remote session closed whatever the outcome.
pub fn backup(ctx: &Context, component: &Component) -> Result<Outcome, OperationError> {
    let _span = tracing::info_span!(
        OPERATION_SPAN,
        operation = "backup",
        component = component.name
    )
    .entered();
    ctx.log.stage(&format!("Backing up {}", component.name));
    run(ctx, component).map_err(into_operation_error(Operation::Backup, component.name))
}

fn run(ctx: &Context, component: &Component) -> StepResult<Outcome> {
    let log = ctx.log.as_ref();
    component
        .ensure_supported(&ctx.platform)
        .at(Step::ValidateSource)?;
    let source = ctx.local_dir(component);
    if let Some(dir) = &source {
        check_source(dir).at(Step::ValidateSource)?;
    }
    let remote = ctx.remote_object(component);

    if ctx.dry_run {
        match &source {
            Some(dir) => log.dry_run(&format!("would archive {} to {remote}", dir.display())),
            None => log.dry_run(&format!(
                "would export {} package lists to {remote}",
                component.name
            )),
        }
        return Ok(Outcome::DryRun);
    }

    let scratch = ctx
        .scratch(component)
        .map_err(|e| StepError::io("create scratch space in", ctx.scratch_root(), e))
        .at(Step::AcquireScratchSpace)?;

    let tree = match source {
        Some(dir) => dir,
        None => {
            let dir = scratch.path().join(component.name);
            let (apps, buckets) =
                package_list::export(ctx.executor.as_ref(), &dir).at(Step::Export)?;
            log.info(&format!("exported {apps} apps and {buckets} buckets"));
            dir
        }
    };

    let archive = scratch.path().join(ctx.archive_name(component));
    log.debug(&format!("archiving {} into {}", tree.display(), archive.display()));
    ctx.codec.compress(&tree, &archive).at(Step::Archive)?;
    log_digest(log, &format!("archived {}", component.name), &archive);

    let mut session = ctx.store.connect().at(Step::Connect)?;
    log.debug(&format!("connected to {}", ctx.store.endpoint()));
    let result = upload(session.as_mut(), ctx.remote_dir(), &archive, &remote);
    close_session(log, session);
    result?;

    log.info(&format!("uploaded {remote}"));
    release(log, scratch);
    Ok(Outcome::Completed)
}

fn check_source(dir: &Path) -> Result<(), StepError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StepError::io(
            "read",
            dir,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        )),
        Err(e) => Err(StepError::io("read", dir, e)),
    }
}

fn upload(
    session: &mut dyn RemoteSession,
    remote_dir: &str,
    archive: &Path,
    remote: &str,
) -> StepResult<()> {
    session.ensure_dir(remote_dir).at(Step::EnsureRemoteDir)?;
    session.upload(archive, remote).at(Step::Upload)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;

    use super::*;
    use crate::components::lookup;
    use crate::error::{ErrorKind, TransportError};
    use crate::exec::{ExecResult, MockExecutor};
    use crate::logging::isolated_logger;
    use crate::pipeline::test_support::{BASE, context, context_on, fish_dir, is_empty_dir};
    use crate::platform::Os;
    use crate::transport::{LocalDirStore, MockRemoteSession, MockRemoteStore};

    fn store_with(session: MockRemoteSession) -> MockRemoteStore {
        let session: Box<dyn RemoteSession> = Box::new(session);
        let mut store = MockRemoteStore::new();
        store.expect_endpoint().return_const("mock".to_string());
        store.expect_connect().times(1).return_once(move || Ok(session));
        store
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn missing_source_fails_without_connecting() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_connect().never();
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("fish").unwrap()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.step, Step::ValidateSource);
        assert_eq!(err.component, "fish");
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn source_that_is_a_file_is_io() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join(".config")).unwrap();
        fs::write(home.path().join(".config/fish"), b"oops").unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_connect().never();
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("fish").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.step, Step::ValidateSource);
    }

    #[test]
    fn package_list_component_unsupported_off_windows() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut store = MockRemoteStore::new();
        store.expect_connect().never();
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("scoop").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.step, Step::ValidateSource);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fish_dir(home.path());
        let mut store = MockRemoteStore::new();
        store.expect_connect().never();
        let mut ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));
        ctx.dry_run = true;

        let outcome = backup(&ctx, lookup("fish").unwrap()).unwrap();
        assert_eq!(outcome, Outcome::DryRun);
        assert!(is_empty_dir(scratch.path()));
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    #[test]
    fn uploads_archive_under_component_name() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fish_dir(home.path());

        let mut session = MockRemoteSession::new();
        session
            .expect_ensure_dir()
            .with(eq(BASE))
            .times(1)
            .returning(|_| Ok(()));
        session
            .expect_upload()
            .withf(|local, remote| {
                local.is_file() && remote == "/srv/dotbackup/fish_backup.tar.gz"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        session.expect_close().times(1).returning(|| Ok(()));
        let store = store_with(session);
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let outcome = backup(&ctx, lookup("fish").unwrap()).unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn failed_upload_still_closes_and_cleans_up() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fish_dir(home.path());

        let mut session = MockRemoteSession::new();
        session.expect_ensure_dir().returning(|_| Ok(()));
        session.expect_upload().returning(|_, remote| {
            Err(TransportError::Transfer {
                path: remote.to_string(),
                reason: "connection reset".to_string(),
            })
        });
        session.expect_close().times(1).returning(|| Ok(()));
        let store = store_with(session);
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("fish").unwrap()).unwrap_err();

        assert_eq!(err.step, Step::Upload);
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn remote_dir_conflict_stops_before_upload() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fish_dir(home.path());

        let mut session = MockRemoteSession::new();
        session.expect_ensure_dir().returning(|path| {
            Err(TransportError::PathConflict {
                path: path.to_string(),
                reason: "exists but is not a directory".to_string(),
            })
        });
        session.expect_upload().never();
        session.expect_close().times(1).returning(|| Ok(()));
        let store = store_with(session);
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("fish").unwrap()).unwrap_err();
        assert_eq!(err.step, Step::EnsureRemoteDir);
        assert_eq!(err.kind(), ErrorKind::PathConflict);
    }

    #[test]
    fn connection_failure_is_reported_at_connect() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fish_dir(home.path());

        let mut store = MockRemoteStore::new();
        store.expect_connect().times(1).returning(|| {
            Err(TransportError::Connection {
                endpoint: "backup@localhost:22".to_string(),
                reason: "refused".to_string(),
            })
        });
        let ctx = context(home.path(), scratch.path(), BASE, Arc::new(store), Arc::new(log));

        let err = backup(&ctx, lookup("fish").unwrap()).unwrap_err();
        assert_eq!(err.step, Step::Connect);
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn writes_object_into_local_store() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        fish_dir(home.path());
        let base = remote.path().join("backups");
        let base_str = base.to_str().unwrap();
        let store = LocalDirStore::new(&base);
        let ctx = context(home.path(), scratch.path(), base_str, Arc::new(store), Arc::new(log));

        backup(&ctx, lookup("fish").unwrap()).unwrap();

        assert!(base.join("fish_backup.tar.gz").is_file());
        assert!(!base.join("fish_backup.tar.gz.part").exists());
    }

    // -----------------------------------------------------------------------
    // Package lists
    // -----------------------------------------------------------------------

    #[test]
    fn package_list_is_exported_then_uploaded() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let mut exec = MockExecutor::new();
        exec.expect_which().with(eq("scoop")).return_const(true);
        exec.expect_run().returning(|_, _| {
            Ok(ExecResult {
                stdout: "Name Version\n---- -------\ngit  2.43.0\n".to_string(),
                success: true,
                code: Some(0),
                ..ExecResult::default()
            })
        });

        let mut session = MockRemoteSession::new();
        session.expect_ensure_dir().returning(|_| Ok(()));
        session
            .expect_upload()
            .withf(|local, remote| local.is_file() && remote == "/srv/dotbackup/scoop_backup.zip")
            .times(1)
            .returning(|_, _| Ok(()));
        session.expect_close().returning(|| Ok(()));
        let store = store_with(session);
        let ctx = context_on(
            Os::Windows,
            home.path(),
            scratch.path(),
            BASE,
            Arc::new(store),
            Arc::new(log),
            Arc::new(exec),
        );

        let outcome = backup(&ctx, lookup("package-manager").unwrap()).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert!(is_empty_dir(scratch.path()));
    }

    #[test]
    fn package_list_export_failure_never_connects() {
        let (log, _tmp, _guard) = isolated_logger();
        let home = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut exec = MockExecutor::new();
        exec.expect_which().return_const(false);
        let mut store = MockRemoteStore::new();
        store.expect_connect().never();
        let ctx = context_on(
            Os::Windows,
            home.path(),
            scratch.path(),
            BASE,
            Arc::new(store),
            Arc::new(log),
            Arc::new(exec),
        );

        let err = backup(&ctx, lookup("scoop").unwrap()).unwrap_err();
        assert_eq!(err.step, Step::Export);
        assert_eq!(err.kind(), ErrorKind::Command);
        assert!(is_empty_dir(scratch.path()));
    }
}
