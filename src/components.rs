//! Static registry of backup components.
//!
//! A component is a named configuration unit (`fish`, `nvim`, `scoop`) whose
//! local state is either a directory resolved per platform or, for package
//! managers, a list exported on demand.
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ConfigError, PlatformError};
use crate::platform::{Os, Platform};

/// What a component's local state is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A configuration directory archived as-is.
    ConfigDir,
    /// Package-manager state exported to files plus a restore script.
    PackageList,
}

/// A registered component.
#[derive(Debug, PartialEq, Eq)]
pub struct Component {
    /// Canonical name, used for the remote object.
    pub name: &'static str,
    /// Alternative names accepted on the command line.
    pub aliases: &'static [&'static str],
    /// Platforms the component runs on; empty means all.
    pub platforms: &'static [Os],
    /// Kind of local state.
    pub kind: SourceKind,
}

/// Every known component, in listing order.
pub static REGISTRY: &[Component] = &[
    Component {
        name: "fish",
        aliases: &[],
        platforms: &[],
        kind: SourceKind::ConfigDir,
    },
    Component {
        name: "nvim",
        aliases: &["editor", "neovim"],
        platforms: &[],
        kind: SourceKind::ConfigDir,
    },
    Component {
        name: "scoop",
        aliases: &["package-manager"],
        platforms: &[Os::Windows],
        kind: SourceKind::PackageList,
    },
];

/// Find a component by name or alias (case-insensitive).
///
/// # Errors
///
/// Returns [`ConfigError::UnknownComponent`] listing the valid names.
pub fn lookup(name: &str) -> Result<&'static Component, ConfigError> {
    let wanted = name.trim().to_ascii_lowercase();
    REGISTRY
        .iter()
        .find(|c| c.name == wanted || c.aliases.contains(&wanted.as_str()))
        .ok_or_else(|| ConfigError::UnknownComponent {
            name: name.to_string(),
            valid: REGISTRY
                .iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Directories that component paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirs {
    /// User home directory.
    pub home: PathBuf,
    /// `%LOCALAPPDATA%`, when set.
    pub local_app_data: Option<PathBuf>,
}

impl Dirs {
    /// Home-only directories; `%LOCALAPPDATA%` falls back to `~/AppData/Local`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            local_app_data: None,
        }
    }

    /// Read `%LOCALAPPDATA%` from the environment.
    #[must_use]
    pub fn from_env(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            local_app_data: std::env::var_os("LOCALAPPDATA").map(PathBuf::from),
        }
    }

    fn local_app_data(&self) -> PathBuf {
        self.local_app_data
            .clone()
            .unwrap_or_else(|| self.home.join("AppData").join("Local"))
    }
}

impl Component {
    /// Fail unless the component runs on `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`].
    pub fn ensure_supported(&self, platform: &Platform) -> Result<(), PlatformError> {
        if platform.supports(self.platforms) {
            Ok(())
        } else {
            Err(PlatformError::Unsupported {
                component: self.name.to_string(),
                platform: platform.os.to_string(),
            })
        }
    }

    /// Local directory for a [`SourceKind::ConfigDir`] component.
    ///
    /// An entry in `overrides` (the config file's `[paths]` table) wins over
    /// the built-in location. Package-list components have no directory.
    #[must_use]
    pub fn local_dir(
        &self,
        platform: &Platform,
        dirs: &Dirs,
        overrides: &BTreeMap<String, PathBuf>,
    ) -> Option<PathBuf> {
        if self.kind == SourceKind::PackageList {
            return None;
        }
        if let Some(dir) = overrides.get(self.name) {
            return Some(dir.clone());
        }
        let config_home = || dirs.home.join(".config");
        match (self.name, platform.os) {
            ("nvim", Os::Windows) => Some(dirs.local_app_data().join("nvim")),
            (name, _) => Some(config_home().join(name)),
        }
    }
}
