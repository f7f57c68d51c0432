//! Process-wide configuration: remote endpoint, path overrides, scratch root.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults ([`remote::DEFAULT_HOST`] and friends)
//! 2. the TOML config file (`--config`, `$DOTBACKUP_CONFIG`, or
//!    `$XDG_CONFIG_HOME/dotbackup/config.toml`)
//! 3. `DOTBACKUP_*` environment variables
//!
//! The result is built once at startup and passed by reference; nothing
//! reads it mutably afterwards.
pub mod remote;
pub mod toml_loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use remote::{Auth, RemoteConfig, RemoteSection, TransportKind};

/// Environment variable naming the config file.
pub const ENV_CONFIG: &str = "DOTBACKUP_CONFIG";
/// Environment override for `remote.transport`.
pub const ENV_TRANSPORT: &str = "DOTBACKUP_TRANSPORT";
/// Environment override for `remote.host`.
pub const ENV_HOST: &str = "DOTBACKUP_HOST";
/// Environment override for `remote.port`.
pub const ENV_PORT: &str = "DOTBACKUP_PORT";
/// Environment override for `remote.user`.
pub const ENV_USER: &str = "DOTBACKUP_USER";
/// Environment override for `remote.password`.
pub const ENV_PASSWORD: &str = "DOTBACKUP_PASSWORD";
/// Environment override for `remote.key_file`.
pub const ENV_KEY_FILE: &str = "DOTBACKUP_KEY_FILE";
/// Environment override for `remote.base_path`.
pub const ENV_BASE_PATH: &str = "DOTBACKUP_BASE_PATH";

/// The config file as written on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    remote: RemoteSection,
    paths: BTreeMap<String, String>,
    scratch_dir: Option<String>,
}

/// All loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Remote endpoint settings.
    pub remote: RemoteConfig,
    /// Per-component local directory overrides, keyed by component name.
    pub paths: BTreeMap<String, PathBuf>,
    /// Parent directory for scratch space; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Config file that was read, if one existed.
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or a
    /// resulting value is invalid.
    pub fn load(explicit: Option<&Path>, home: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit, home, |key| std::env::var(key).ok())
    }

    /// Load configuration, reading environment variables through `env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or a
    /// resulting value is invalid.
    pub fn load_with_env(
        explicit: Option<&Path>,
        home: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = explicit.map_or_else(|| default_config_path(home, &env), Path::to_path_buf);
        let file: FileConfig = toml_loader::load_config(&path)?;
        let source = path.exists().then_some(path);

        let remote = resolve_remote(file.remote, home, &env)?;
        remote.validate()?;

        let paths = file
            .paths
            .into_iter()
            .map(|(name, dir)| (name, expand_home(&dir, home)))
            .collect();

        Ok(Self {
            remote,
            paths,
            scratch_dir: file.scratch_dir.map(|dir| expand_home(&dir, home)),
            source,
        })
    }
}

/// `$DOTBACKUP_CONFIG`, else `$XDG_CONFIG_HOME/dotbackup/config.toml`, else
/// `~/.config/dotbackup/config.toml`.
fn default_config_path(home: &Path, env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = env(ENV_CONFIG) {
        return PathBuf::from(path);
    }
    env("XDG_CONFIG_HOME")
        .map_or_else(|| home.join(".config"), PathBuf::from)
        .join("dotbackup")
        .join("config.toml")
}

fn resolve_remote(
    section: RemoteSection,
    home: &Path,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<RemoteConfig, ConfigError> {
    let defaults = RemoteConfig::default();

    let transport = match env(ENV_TRANSPORT).or(section.transport) {
        Some(value) => value.parse::<TransportKind>()?,
        None => defaults.transport,
    };

    let port = match env(ENV_PORT) {
        Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
            key: ENV_PORT.to_string(),
            value: value.clone(),
            reason: "must be a port number".to_string(),
        })?,
        None => section.port.unwrap_or(defaults.port),
    };

    let password = env(ENV_PASSWORD).or(section.password);
    let key_file = env(ENV_KEY_FILE).or(section.key_file);
    let auth = match (password, key_file) {
        (Some(password), _) => Auth::Password(password),
        (None, Some(key)) => Auth::KeyFile {
            path: expand_home(&key, home),
            passphrase: section.passphrase,
        },
        (None, None) => Auth::Agent,
    };

    let base_path = env(ENV_BASE_PATH)
        .or(section.base_path)
        .unwrap_or(defaults.base_path);

    Ok(RemoteConfig {
        transport,
        host: env(ENV_HOST).or(section.host).unwrap_or(defaults.host),
        port,
        user: env(ENV_USER).or(section.user).unwrap_or(defaults.user),
        auth,
        base_path,
        timeout: section
            .timeout_secs
            .map_or(defaults.timeout, Duration::from_secs),
    })
}

/// Expand a leading `~` to `home`.
#[must_use]
pub fn expand_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    value
        .strip_prefix("~/")
        .or_else(|| value.strip_prefix("~\\"))
        .map_or_else(|| PathBuf::from(value), |rest| home.join(rest))
}
