//! Subcommand entry points and the setup they share.
pub mod apply;
pub mod backup;
pub mod completions;
pub mod list;
pub mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::components::{self, Component, REGISTRY};
use crate::config::Config;
use crate::error::OperationError;
use crate::exec::SystemExecutor;
use crate::logging::{Log, Logger, OperationStatus};
use crate::pipeline::{Context, Outcome};
use crate::platform::Platform;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Platform this run targets.
    pub platform: Platform,
    /// Merged defaults, config file and environment.
    pub config: Config,
    /// Home directory component paths resolve against.
    pub home: PathBuf,
}

impl CommandSetup {
    /// Detect the platform and load configuration for the user at `home`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn init(global: &GlobalOpts, home: &Path, log: &Logger) -> Result<Self> {
        let platform = Platform::detect();

        log.stage("Loading configuration");
        let config = Config::load(global.config.as_deref(), home)?;
        match &config.source {
            Some(path) => log.info(&format!("config: {}", path.display())),
            None => log.info("no config file, using defaults"),
        }
        log.info(&format!(
            "remote: {} ({})",
            config.remote.endpoint(),
            config.remote.base_path
        ));

        for name in config.paths.keys() {
            if !REGISTRY.iter().any(|c| c.name == name) {
                log.warn(&format!("[paths] entry '{name}' does not name a component"));
            }
        }

        Ok(Self {
            platform,
            config,
            home: home.to_path_buf(),
        })
    }

    /// Turn the setup into a pipeline context.
    #[must_use]
    pub fn into_context(self, log: Arc<dyn Log>, dry_run: bool) -> Context {
        Context::new(
            self.config,
            self.platform,
            log,
            Arc::new(SystemExecutor),
            &self.home,
            dry_run,
        )
    }
}

/// The user's home directory (`USERPROFILE` first on Windows).
///
/// # Errors
///
/// Returns an error if no home variable is set.
pub fn home_dir() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .map_err(|_| anyhow::anyhow!("neither USERPROFILE nor HOME environment variable is set"))?
    } else {
        std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable is not set"))?
    };
    Ok(PathBuf::from(home))
}

/// Resolve names and aliases to components, dropping repeats.
///
/// # Errors
///
/// Returns an error naming the first unknown component.
pub fn resolve_components(names: &[String]) -> Result<Vec<&'static Component>> {
    let mut resolved: Vec<&'static Component> = Vec::with_capacity(names.len());
    for name in names {
        let component = components::lookup(name).context("resolving components")?;
        if !resolved.iter().any(|c| c.name == component.name) {
            resolved.push(component);
        }
    }
    Ok(resolved)
}

/// One pipeline entry point: [`crate::pipeline::backup`] or
/// [`crate::pipeline::restore`].
pub type Pipeline = fn(&Context, &Component) -> Result<Outcome, OperationError>;

/// Run `pipeline` for every component, record each result, print the
/// summary, and bail if any component failed.
///
/// # Errors
///
/// Returns an error if one or more components failed.
pub fn run_to_completion(
    components: &[&Component],
    pipeline: Pipeline,
    verb: &str,
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    for component in components {
        record(log, &format!("{verb} {}", component.name), pipeline(ctx, component));
    }

    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} component(s) failed");
    }
    Ok(())
}

fn record(log: &dyn Log, label: &str, result: Result<Outcome, OperationError>) {
    match result {
        Ok(Outcome::Completed) => log.record_result(label, OperationStatus::Ok, None),
        Ok(Outcome::DryRun) => log.record_result(label, OperationStatus::DryRun, None),
        Err(e) => {
            log.error(&e.to_string());
            let detail = format!("{} at {}", e.kind(), e.step);
            log.record_result(label, OperationStatus::Failed, Some(&detail));
        }
    }
}
