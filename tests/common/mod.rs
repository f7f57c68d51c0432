// Shared helpers for integration tests.
//
// Provides a temporary directory laid out as a user's home, a local remote
// store and a scratch root, plus a builder for pipeline contexts that go
// through the real config loader.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotbackup_cli::cli::{ComponentOpts, GlobalOpts};
use dotbackup_cli::components::{self, Component};
use dotbackup_cli::config::Config;
use dotbackup_cli::exec::SystemExecutor;
use dotbackup_cli::logging::Logger;
use dotbackup_cli::pipeline::Context;
use dotbackup_cli::platform::Platform;

/// `set -x A 1`, the 10-byte fish config used across scenarios.
pub const FISH_CONFIG: &[u8] = b"set -x A 1";

/// An isolated machine backed by a [`tempfile::TempDir`].
///
/// Layout:
/// - `home/`            — the user's home directory
/// - `remote/backups/`  — the local store's base directory
/// - `scratch/`         — parent of per-operation scratch directories
/// - `config.toml`      — the config file pointing at the two above
pub struct IntegrationTestContext {
    /// Temporary directory containing everything.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a new machine with an empty home and an empty remote.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        for dir in ["home", "remote/backups", "scratch"] {
            std::fs::create_dir_all(root.path().join(dir)).expect("create layout dir");
        }
        let ctx = Self { root };
        let config = format!(
            "scratch_dir = '{}'\n\n[remote]\ntransport = \"local\"\nbase_path = '{}'\n",
            ctx.scratch().display(),
            ctx.remote_base().display()
        );
        std::fs::write(ctx.config_path(), config).expect("write config.toml");
        ctx
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    pub fn remote_base(&self) -> PathBuf {
        self.root.path().join("remote").join("backups")
    }

    pub fn scratch(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("config.toml")
    }

    /// Local directory of the fish component.
    pub fn fish_dir(&self) -> PathBuf {
        self.home().join(".config").join("fish")
    }

    /// Create `~/.config/fish` with a 10-byte `config.fish` and an empty
    /// `functions/` directory.
    pub fn with_fish(self) -> Self {
        let dir = self.fish_dir();
        std::fs::create_dir_all(dir.join("functions")).expect("create functions dir");
        std::fs::write(dir.join("config.fish"), FISH_CONFIG).expect("write config.fish");
        self
    }

    /// Append a `[paths]` table to the config file.
    pub fn with_paths(self, entries: &[(&str, &Path)]) -> Self {
        let mut table = String::from("\n[paths]\n");
        for (name, path) in entries {
            writeln!(table, "{name} = '{}'", path.display()).expect("format paths entry");
        }
        std::fs::OpenOptions::new()
            .append(true)
            .open(self.config_path())
            .and_then(|mut f| f.write_all(table.as_bytes()))
            .expect("append [paths] to config.toml");
        self
    }

    /// Global options as the CLI would pass them with `--config`.
    pub fn global_opts(&self, dry_run: bool) -> GlobalOpts {
        GlobalOpts {
            dry_run,
            config: Some(self.config_path()),
        }
    }

    /// Load the config file with no environment overrides.
    pub fn load_config(&self) -> Config {
        Config::load_with_env(Some(&self.config_path()), &self.home(), |_| None)
            .expect("load config")
    }

    /// Pipeline context for the host platform.
    pub fn context(&self) -> Context {
        self.context_with(false)
    }

    /// Pipeline context for the host platform, optionally in dry-run mode.
    pub fn context_with(&self, dry_run: bool) -> Context {
        Context::new(
            self.load_config(),
            Platform::detect(),
            Arc::new(Logger::with_log_file(None)),
            Arc::new(SystemExecutor),
            &self.home(),
            dry_run,
        )
    }

    /// Files directly inside the scratch root.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        list(&self.scratch())
    }

    /// Files directly inside the remote base directory.
    pub fn remote_entries(&self) -> Vec<PathBuf> {
        list(&self.remote_base())
    }
}

fn list(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(Result::ok).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

/// Positional component arguments.
pub fn component_opts(names: &[&str]) -> ComponentOpts {
    ComponentOpts {
        components: names.iter().map(|n| (*n).to_string()).collect(),
    }
}

/// Logger with no log file; nothing is installed as the global subscriber.
pub fn quiet_logger() -> Arc<Logger> {
    Arc::new(Logger::with_log_file(None))
}

/// Look up a registered component.
pub fn component(name: &str) -> &'static Component {
    components::lookup(name).expect("registered component")
}
