//! Domain-specific error types for the backup engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! The codec, transport and configuration layers return typed errors, the
//! pipeline wraps them in an [`OperationError`] naming the component and the
//! failed step, and command handlers at the CLI boundary convert to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! OperationError { operation, component, step }
//! └── StepError
//!     ├── Codec(CodecError)        — archive build / unpack
//!     ├── Transport(TransportError)— session, remote paths, streaming
//!     ├── Platform(PlatformError)  — component unavailable on this OS
//!     ├── Io                       — local filesystem around the pipeline
//!     └── Command                  — external package-manager tools
//! ConfigError                      — config file, env overrides, registry
//! ```
//!
//! Every error reports an [`ErrorKind`] so callers and tests can tell a
//! missing remote object from a refused connection without string matching.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local filesystem failure (missing directory, permission denied, disk full).
    Io,
    /// Malformed or unreadable archive, or the archiver itself failing.
    Archive,
    /// Could not establish an authenticated remote session.
    Connection,
    /// A path exists but has the wrong type (file where a directory is required).
    PathConflict,
    /// The requested remote object does not exist.
    NotFound,
    /// An upload or download did not complete fully.
    Transfer,
    /// An external tool exited unsuccessfully.
    Command,
    /// The operation is not available on this platform.
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Io => "io",
            Self::Archive => "archive",
            Self::Connection => "connection",
            Self::PathConflict => "path conflict",
            Self::NotFound => "not found",
            Self::Transfer => "transfer",
            Self::Command => "command",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Errors raised while building or unpacking an archive.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Local filesystem failure on `path`.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The archive could not be produced or is not readable.
    #[error("archive error on {}: {source}", path.display())]
    Archive {
        /// Archive file involved.
        path: PathBuf,
        /// Underlying archiver error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An entry would be written outside the destination directory.
    #[error("archive entry '{entry}' escapes the destination directory")]
    UnsafeEntry {
        /// Entry name as stored in the archive.
        entry: String,
    },
}

impl CodecError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Archive { .. } | Self::UnsafeEntry { .. } => ErrorKind::Archive,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Archive {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Errors raised by a remote store or session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The session could not be opened or authenticated.
    #[error("cannot connect to {endpoint}: {reason}")]
    Connection {
        /// `user@host:port` or the local base directory.
        endpoint: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A remote path exists with the wrong type.
    #[error("remote path conflict at {path}: {reason}")]
    PathConflict {
        /// Remote path.
        path: String,
        /// What was expected.
        reason: String,
    },

    /// The remote object or directory does not exist.
    #[error("remote object not found: {path}")]
    NotFound {
        /// Remote path.
        path: String,
    },

    /// Streaming did not complete.
    #[error("transfer of {path} failed: {reason}")]
    Transfer {
        /// Remote path.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The local side of a transfer failed.
    #[error("local I/O error on {}: {source}", path.display())]
    Local {
        /// Local file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl TransportError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::PathConflict { .. } => ErrorKind::PathConflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Local { .. } => ErrorKind::Io,
        }
    }
}

/// Errors that arise from configuration loading and component lookup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("Invalid config file {path}: {message}")]
    Parse {
        /// Path to the offending file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Setting name (e.g. `remote.port`).
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No component is registered under the requested name.
    #[error("Unknown component '{name}': must be one of {valid}")]
    UnknownComponent {
        /// Requested name.
        name: String,
        /// Comma-separated list of registered names.
        valid: String,
    },
}

/// Errors that arise from platform-specific operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The component cannot be handled on the current platform.
    #[error("'{component}' is not supported on {platform}")]
    Unsupported {
        /// Component name.
        component: String,
        /// Name of the platform (e.g., `"linux"`).
        platform: String,
    },
}

/// Cause of a failed pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    /// Archive codec failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Remote transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Component unavailable on this platform.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Local filesystem failure outside the codec.
    #[error("{action} {}: {source}", path.display())]
    Io {
        /// What was being attempted (e.g. `"rename"`).
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool failed.
    #[error("{0}")]
    Command(String),
}

impl StepError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Codec(e) => e.kind(),
            Self::Transport(e) => e.kind(),
            Self::Platform(_) => ErrorKind::Unsupported,
            Self::Io { .. } => ErrorKind::Io,
            Self::Command(_) => ErrorKind::Command,
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Which pipeline is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Local directory to remote object.
    Backup,
    /// Remote object to local directory.
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup => f.write_str("backup"),
            Self::Restore => f.write_str("restore"),
        }
    }
}

/// Pipeline steps, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Check the component and its local source.
    ValidateSource,
    /// Create the operation's scratch directory.
    AcquireScratchSpace,
    /// Export package-manager state into scratch.
    Export,
    /// Build the archive.
    Archive,
    /// Open the remote session.
    Connect,
    /// Make sure the remote base directory exists.
    EnsureRemoteDir,
    /// Stream the archive to the remote store.
    Upload,
    /// Stream the remote object into scratch.
    Download,
    /// Move the live target aside to `.bak`.
    BackupExistingTarget,
    /// Create the empty target directory.
    RecreateTargetDir,
    /// Unpack the archive.
    Extract,
    /// Copy the unpacked tree into the target.
    Install,
    /// Run the package-manager restore script.
    RunRestoreScript,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValidateSource => "validate source",
            Self::AcquireScratchSpace => "acquire scratch space",
            Self::Export => "export",
            Self::Archive => "archive",
            Self::Connect => "connect",
            Self::EnsureRemoteDir => "ensure remote directory",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::BackupExistingTarget => "back up existing target",
            Self::RecreateTargetDir => "recreate target directory",
            Self::Extract => "extract",
            Self::Install => "install",
            Self::RunRestoreScript => "run restore script",
        };
        f.write_str(s)
    }
}

/// A backup or restore that stopped at `step`.
#[derive(Error, Debug)]
#[error("{operation} of '{component}' failed at {step}: {source}")]
pub struct OperationError {
    /// Backup or restore.
    pub operation: Operation,
    /// Canonical component name.
    pub component: String,
    /// Step that failed.
    pub step: Step,
    /// Underlying cause.
    pub source: StepError,
}

impl OperationError {
    /// Classify this error by its cause.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // CodecError
    // -----------------------------------------------------------------------

    #[test]
    fn codec_io_display_and_kind() {
        let e = CodecError::io(
            "/home/u/.config/fish",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(e.to_string().contains("/home/u/.config/fish"));
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[test]
    fn codec_unsafe_entry_is_archive_kind() {
        let e = CodecError::UnsafeEntry {
            entry: "../evil".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "archive entry '../evil' escapes the destination directory"
        );
        assert_eq!(e.kind(), ErrorKind::Archive);
    }

    #[test]
    fn codec_archive_has_source() {
        use std::error::Error as StdError;
        let e = CodecError::archive("/tmp/x.zip", "invalid central directory");
        assert!(e.source().is_some());
        assert_eq!(e.kind(), ErrorKind::Archive);
    }

    // -----------------------------------------------------------------------
    // TransportError
    // -----------------------------------------------------------------------

    #[test]
    fn transport_kinds() {
        let cases = [
            (
                TransportError::Connection {
                    endpoint: "u@h:22".into(),
                    reason: "refused".into(),
                },
                ErrorKind::Connection,
            ),
            (
                TransportError::PathConflict {
                    path: "/srv".into(),
                    reason: "not a directory".into(),
                },
                ErrorKind::PathConflict,
            ),
            (
                TransportError::NotFound {
                    path: "/srv/fish_backup.tar.gz".into(),
                },
                ErrorKind::NotFound,
            ),
            (
                TransportError::Transfer {
                    path: "/srv/fish_backup.tar.gz".into(),
                    reason: "short write".into(),
                },
                ErrorKind::Transfer,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn transport_not_found_display() {
        let e = TransportError::NotFound {
            path: "/srv/backups/fish_backup.tar.gz".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "remote object not found: /srv/backups/fish_backup.tar.gz"
        );
    }

    // -----------------------------------------------------------------------
    // ConfigError / PlatformError
    // -----------------------------------------------------------------------

    #[test]
    fn config_error_unknown_component_display() {
        let e = ConfigError::UnknownComponent {
            name: "emacs".to_string(),
            valid: "fish, nvim, scoop".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Unknown component 'emacs': must be one of fish, nvim, scoop"
        );
    }

    #[test]
    fn config_error_invalid_value_display() {
        let e = ConfigError::InvalidValue {
            key: "remote.port".to_string(),
            value: "0".to_string(),
            reason: "must be between 1 and 65535".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Invalid value '0' for remote.port: must be between 1 and 65535"
        );
    }

    #[test]
    fn platform_error_unsupported_display() {
        let e = PlatformError::Unsupported {
            component: "scoop".to_string(),
            platform: "linux".to_string(),
        };
        assert_eq!(e.to_string(), "'scoop' is not supported on linux");
    }

    // -----------------------------------------------------------------------
    // OperationError
    // -----------------------------------------------------------------------

    #[test]
    fn operation_error_names_component_and_step() {
        let e = OperationError {
            operation: Operation::Restore,
            component: "fish".to_string(),
            step: Step::Download,
            source: TransportError::NotFound {
                path: "/srv/fish_backup.tar.gz".to_string(),
            }
            .into(),
        };
        assert_eq!(
            e.to_string(),
            "restore of 'fish' failed at download: remote object not found: /srv/fish_backup.tar.gz"
        );
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn step_error_kind_forwards() {
        let e: StepError = PlatformError::Unsupported {
            component: "scoop".into(),
            platform: "linux".into(),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::Unsupported);
        assert_eq!(StepError::Command("boom".into()).kind(), ErrorKind::Command);
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<CodecError>();
        assert_send_sync::<TransportError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<PlatformError>();
        assert_send_sync::<StepError>();
        assert_send_sync::<OperationError>();
    }

    #[test]
    fn operation_error_converts_to_anyhow() {
        let e = OperationError {
            operation: Operation::Backup,
            component: "nvim".to_string(),
            step: Step::Connect,
            source: StepError::Command("x".into()),
        };
        let _anyhow_err: anyhow::Error = e.into();
    }
}
