//! Backup command implementation.
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{ComponentOpts, GlobalOpts};
use crate::logging::{Log, Logger};
use crate::pipeline;

/// Run the backup command.
///
/// # Errors
///
/// Returns an error if a component name is unknown, configuration loading
/// fails, or any component fails to back up.
pub fn run(
    global: &GlobalOpts,
    opts: &ComponentOpts,
    home: &Path,
    log: &Arc<Logger>,
) -> Result<()> {
    let components = super::resolve_components(&opts.components)?;
    let setup = super::CommandSetup::init(global, home, log)?;
    let shared: Arc<dyn Log> = Arc::clone(log) as _;
    let ctx = setup.into_context(shared, global.dry_run);
    super::run_to_completion(&components, pipeline::backup, "backup", &ctx, log)
}
