//! Remote endpoint settings.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default SSH host when neither the config file nor the environment set one.
pub const DEFAULT_HOST: &str = "localhost";
/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;
/// Default SSH user.
pub const DEFAULT_USER: &str = "backup";
/// Default remote directory holding the backup objects.
pub const DEFAULT_BASE_PATH: &str = "/srv/dotbackup";
/// Default connect/read timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which backend carries the remote objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// SFTP over SSH.
    Sftp,
    /// A directory on a locally mounted filesystem.
    Local,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sftp" | "ssh" => Ok(Self::Sftp),
            "local" | "dir" => Ok(Self::Local),
            other => Err(ConfigError::InvalidValue {
                key: "remote.transport".to_string(),
                value: other.to_string(),
                reason: "must be 'sftp' or 'local'".to_string(),
            }),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sftp => f.write_str("sftp"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// How the SSH session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Password authentication.
    Password(String),
    /// Private key file, optionally encrypted.
    KeyFile {
        /// Path to the private key.
        path: PathBuf,
        /// Passphrase for an encrypted key.
        passphrase: Option<String>,
    },
    /// Keys offered by a running SSH agent.
    Agent,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::KeyFile { path, passphrase } => f
                .debug_struct("KeyFile")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Agent => f.write_str("Agent"),
        }
    }
}

/// Resolved settings for the single remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Backend selection.
    pub transport: TransportKind,
    /// SSH host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// SSH user.
    pub user: String,
    /// Authentication method.
    pub auth: Auth,
    /// Remote directory holding `<component>_backup.<ext>` objects.
    pub base_path: String,
    /// Connect and I/O timeout.
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Sftp,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            auth: Auth::Agent,
            base_path: DEFAULT_BASE_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RemoteConfig {
    /// Human-readable endpoint used in log lines and errors.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self.transport {
            TransportKind::Sftp => format!("{}@{}:{}", self.user, self.host, self.port),
            TransportKind::Local => self.base_path.clone(),
        }
    }

    /// Reject values the transport cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if self.base_path.trim().is_empty() {
            return Err(invalid("remote.base_path", &self.base_path, "must not be empty"));
        }
        if self.transport == TransportKind::Local {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(invalid("remote.host", &self.host, "must not be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(invalid("remote.user", &self.user, "must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid(
                "remote.port",
                "0",
                "must be between 1 and 65535",
            ));
        }
        if !self.base_path.starts_with('/') {
            return Err(invalid(
                "remote.base_path",
                &self.base_path,
                "must be an absolute remote path",
            ));
        }
        Ok(())
    }
}

/// `[remote]` table as written in the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(super) struct RemoteSection {
    pub transport: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_file: Option<String>,
    pub passphrase: Option<String>,
    pub base_path: Option<String>,
    pub timeout_secs: Option<u64>,
}
