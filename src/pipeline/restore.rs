//! Restore pipeline: download, set the live directory aside, install.
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    AtStep as _, Context, Outcome, StepResult, close_session, into_operation_error, log_digest,
    package_list, release,
};
use crate::components::Component;
use crate::error::{CodecError, Operation, OperationError, Step, StepError};
use crate::fsutil::{backup_path, copy_dir_recursive, exists_no_follow, remove_existing};
use crate::logging::OPERATION_SPAN;

/// Scratch subdirectory archives are unpacked into.
const STAGING_DIR: &str = "staging";

/// Download `component`'s archive and put it back in place.
///
/// A configuration directory is first moved aside to `<dir>.bak`; if the
/// restore fails after that point the previous contents stay there.
///
/// # Errors
///
/// Returns an [`OperationError`] naming the step that failed.
pub fn restore(ctx: &Context, component: &Component) -> Result<Outcome, OperationError> {
    let _span = tracing::info_span!(
        OPERATION_SPAN,
        operation = "restore",
        component = component.name
    )
    .entered();
    ctx.log.stage(&format!("Restoring {}", component.name));
    run(ctx, component).map_err(into_operation_error(Operation::Restore, component.name))
}

fn run(ctx: &Context, component: &Component) -> StepResult<Outcome> {
    let log = ctx.log.as_ref();
    component
        .ensure_supported(&ctx.platform)
        .at(Step::ValidateSource)?;
    let target = ctx.local_dir(component);
    let remote = ctx.remote_object(component);

    if ctx.dry_run {
        log.dry_run(&format!("would download {remote}"));
        match &target {
            Some(dir) => {
                if exists_no_follow(dir) {
                    log.dry_run(&format!(
                        "would move {} to {}",
                        dir.display(),
                        backup_path(dir).display()
                    ));
                }
                log.dry_run(&format!("would unpack into {}", dir.display()));
            }
            None => log.dry_run(&format!("would run {}", package_list::RESTORE_SCRIPT)),
        }
        return Ok(Outcome::DryRun);
    }

    let scratch = ctx
        .scratch(component)
        .map_err(|e| StepError::io("create scratch space in", ctx.scratch_root(), e))
        .at(Step::AcquireScratchSpace)?;
    let archive = scratch.path().join(ctx.archive_name(component));
    fetch(ctx, &remote, &archive)?;
    log_digest(log, &format!("downloaded {remote}"), &archive);

    let staging = scratch.path().join(STAGING_DIR);
    match target {
        Some(dir) => replace_dir(ctx, &archive, &staging, &dir)?,
        None => {
            let tree = unpack(ctx, &archive, &staging)?;
            package_list::run_restore(ctx.executor.as_ref(), &tree).at(Step::RunRestoreScript)?;
        }
    }

    log.info(&format!("restored {}", component.name));
    release(log, scratch);
    Ok(Outcome::Completed)
}

fn fetch(ctx: &Context, remote: &str, archive: &Path) -> StepResult<()> {
    let mut session = ctx.store.connect().at(Step::Connect)?;
    ctx.log
        .debug(&format!("connected to {}", ctx.store.endpoint()));
    let result = session.download(remote, archive).at(Step::Download);
    close_session(ctx.log.as_ref(), session);
    result
}

/// Unpack into `staging` and return the archive's top-level directory.
///
/// The root keeps whatever name the backing-up machine gave it, so a
/// `[paths]` override on either side does not matter.
fn unpack(ctx: &Context, archive: &Path, staging: &Path) -> StepResult<PathBuf> {
    ctx.codec.extract(archive, staging).at(Step::Extract)?;
    single_root(archive, staging).at(Step::Extract)
}

/// The only entry of `staging`, which must be a directory.
fn single_root(archive: &Path, staging: &Path) -> Result<PathBuf, StepError> {
    let mut roots = Vec::new();
    for entry in fs::read_dir(staging).map_err(|e| StepError::io("read", staging, e))? {
        roots.push(entry.map_err(|e| StepError::io("read", staging, e))?.path());
    }
    match roots.as_slice() {
        [root] if root.is_dir() => Ok(root.clone()),
        [] => Err(CodecError::archive(archive, "archive is empty").into()),
        _ => Err(CodecError::archive(
            archive,
            format!(
                "expected a single top-level directory, found {} entries",
                roots.len()
            ),
        )
        .into()),
    }
}

fn replace_dir(
    ctx: &Context,
    archive: &Path,
    staging: &Path,
    target: &Path,
) -> StepResult<()> {
    let log = ctx.log.as_ref();
    let bak = backup_path(target);
    let moved = move_aside(target, &bak).at(Step::BackupExistingTarget)?;
    if moved {
        log.info(&format!("moved {} to {}", target.display(), bak.display()));
    }

    let result = fs::create_dir_all(target)
        .map_err(|e| StepError::io("create", target, e))
        .at(Step::RecreateTargetDir)
        .and_then(|()| unpack(ctx, archive, staging))
        .and_then(|tree| {
            copy_dir_recursive(&tree, target)
                .map_err(|e| StepError::io("copy into", target, e))
                .at(Step::Install)
        });
    if result.is_err() && moved {
        log.warn(&format!("previous contents kept in {}", bak.display()));
    }
    result
}

/// Rename `target` to `bak`, replacing a stale `bak`. Returns whether
/// anything was moved.
fn move_aside(target: &Path, bak: &Path) -> Result<bool, StepError> {
    if !exists_no_follow(target) {
        return Ok(false);
    }
    remove_existing(bak).map_err(|e| StepError::io("remove", bak, e))?;
    fs::rename(target, bak).map_err(|e| StepError::io("rename", target, e))?;
    Ok(true)
}
