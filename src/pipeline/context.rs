use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::archive::{ArchiveCodec, ArchiveFormat, codec_for};
use crate::components::{Component, Dirs};
use crate::config::Config;
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::Platform;
use crate::transport::{RemoteStore, remote_object_path, store_for};

/// Everything a backup or restore needs, shared across components.
pub struct Context {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Detected platform.
    pub platform: Arc<Platform>,
    /// Logger for output and result recording.
    pub log: Arc<dyn Log>,
    /// Remote store selected by the configuration.
    pub store: Arc<dyn RemoteStore>,
    /// Archive codec, chosen once for the platform.
    pub codec: Arc<dyn ArchiveCodec>,
    /// Runs package-manager commands.
    pub executor: Arc<dyn Executor>,
    /// Directories component paths are resolved against.
    pub dirs: Dirs,
    /// Log what would happen without touching anything.
    pub dry_run: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("store", &self.store.endpoint())
            .field("codec", &self.codec.format())
            .field("executor", &"<dyn Executor>")
            .field("dirs", &self.dirs)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Context {
    /// Build a context with the store and codec the configuration and
    /// platform call for.
    #[must_use]
    pub fn new(
        config: Config,
        platform: Platform,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
        home: &Path,
        dry_run: bool,
    ) -> Self {
        let store: Arc<dyn RemoteStore> = Arc::from(store_for(&config.remote));
        let codec: Arc<dyn ArchiveCodec> = Arc::from(codec_for(ArchiveFormat::for_os(platform.os)));
        Self {
            config: Arc::new(config),
            platform: Arc::new(platform),
            log,
            store,
            codec,
            executor,
            dirs: Dirs::from_env(home),
            dry_run,
        }
    }

    /// Local directory of `component`, after `[paths]` overrides.
    #[must_use]
    pub fn local_dir(&self, component: &Component) -> Option<PathBuf> {
        component.local_dir(&self.platform, &self.dirs, &self.config.paths)
    }

    /// Remote object holding `component`'s archive.
    #[must_use]
    pub fn remote_object(&self, component: &Component) -> String {
        remote_object_path(
            &self.config.remote.base_path,
            component.name,
            self.codec.format(),
        )
    }

    /// Remote directory holding every object.
    #[must_use]
    pub fn remote_dir(&self) -> &str {
        let base = self.config.remote.base_path.trim_end_matches('/');
        if base.is_empty() { "/" } else { base }
    }

    /// File name the archive gets inside scratch space.
    #[must_use]
    pub fn archive_name(&self, component: &Component) -> String {
        format!("{}_backup.{}", component.name, self.codec.format().extension())
    }

    /// Parent directory for scratch space.
    #[must_use]
    pub fn scratch_root(&self) -> PathBuf {
        self.config
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Create a fresh scratch directory for one operation. It is removed
    /// when the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn scratch(&self, component: &Component) -> std::io::Result<TempDir> {
        let root = self.scratch_root();
        std::fs::create_dir_all(&root)?;
        tempfile::Builder::new()
            .prefix(&format!("dotbackup-{}-", component.name))
            .tempdir_in(root)
    }
}
