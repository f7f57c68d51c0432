//! Remote stores holding one archive per component.
//!
//! A [`RemoteStore`] knows how to reach the endpoint; each operation opens
//! its own [`RemoteSession`] and closes it when done. Remote paths are
//! always `/`-separated strings; local paths are [`Path`]s.
pub mod local;
pub mod sftp;

use std::io::{self, Read, Write};
use std::path::Path;

use crate::archive::ArchiveFormat;
use crate::config::remote::{RemoteConfig, TransportKind};
use crate::error::TransportError;

pub use self::local::LocalDirStore;
pub use self::sftp::SftpStore;

/// Suffix of the temporary object an upload writes before renaming.
pub const PART_SUFFIX: &str = ".part";

/// Opens sessions against one endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteStore: Send + Sync {
    /// `user@host:port`, or the base directory for local stores.
    fn endpoint(&self) -> String;

    /// Open an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] if the endpoint is unreachable
    /// or rejects the credentials.
    fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError>;
}

/// An open session. Dropping it releases the connection.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteSession: Send {
    /// Make sure `path` exists as a directory. Its parent must already exist.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotFound`] if the parent is missing,
    /// [`TransportError::PathConflict`] if the parent or `path` is not a
    /// directory.
    fn ensure_dir(&mut self, path: &str) -> Result<(), TransportError>;

    /// Stream `local_file` to `remote_path`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// [`TransportError::Transfer`] if the object is not written completely,
    /// [`TransportError::Local`] if `local_file` cannot be read.
    fn upload(&mut self, local_file: &Path, remote_path: &str) -> Result<(), TransportError>;

    /// Stream `remote_path` into `local_file`.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotFound`] if the object does not exist,
    /// [`TransportError::Transfer`] on a short read,
    /// [`TransportError::Local`] if `local_file` cannot be written.
    fn download(&mut self, remote_path: &str, local_file: &Path) -> Result<(), TransportError>;

    /// Release the session. Further calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] if the disconnect fails.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// `<base>/<component>_backup.<ext>`, with any trailing `/` on `base`
/// dropped.
#[must_use]
pub fn remote_object_path(base: &str, component: &str, format: ArchiveFormat) -> String {
    let base = base.trim_end_matches('/');
    format!("{base}/{component}_backup.{}", format.extension())
}

/// Parent of a `/`-separated remote path (`/` for top-level entries).
#[must_use]
pub fn remote_parent(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => ".",
    }
}

/// Build the store selected by `config.transport`.
#[must_use]
pub fn store_for(config: &RemoteConfig) -> Box<dyn RemoteStore> {
    match config.transport {
        TransportKind::Sftp => Box::new(SftpStore::new(config.clone())),
        TransportKind::Local => Box::new(LocalDirStore::new(&config.base_path)),
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
enum PumpError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy `reader` into `writer`, returning the byte count.
///
/// Unlike `io::copy`, the error says which side failed: local disk or remote.
fn pump(reader: &mut impl Read, writer: &mut impl Write) -> Result<u64, PumpError> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PumpError::Read(e)),
        };
        writer
            .write_all(buf.get(..n).unwrap_or_default())
            .map_err(PumpError::Write)?;
        total += n as u64;
    }
    writer.flush().map_err(PumpError::Write)?;
    Ok(total)
}

fn short_transfer(path: &str, copied: u64, expected: u64) -> TransportError {
    TransportError::Transfer {
        path: path.to_string(),
        reason: format!("transferred {copied} of {expected} bytes"),
    }
}
