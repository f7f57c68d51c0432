//! SFTP store over `libssh2`.
use std::fs::File;
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs as _};
use std::path::Path;

use ssh2::{ErrorCode, RenameFlags, Session, Sftp};

use super::{
    PART_SUFFIX, PumpError, RemoteSession, RemoteStore, pump, remote_parent, short_transfer,
};
use crate::config::remote::{Auth, RemoteConfig};
use crate::error::TransportError;

/// `LIBSSH2_FX_NO_SUCH_FILE`.
const FX_NO_SUCH_FILE: i32 = 2;

/// Mode for directories created on the server.
const DIR_MODE: i32 = 0o755;

/// Store reached over SSH.
#[derive(Debug, Clone)]
pub struct SftpStore {
    config: RemoteConfig,
}

impl SftpStore {
    /// Store for the endpoint described by `config`.
    #[must_use]
    pub const fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn open_session(&self) -> Result<Session, String> {
        let cfg = &self.config;
        let addr = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve {}: {e}", cfg.host))?
            .next()
            .ok_or_else(|| format!("{} has no address", cfg.host))?;
        let tcp = TcpStream::connect_timeout(&addr, cfg.timeout).map_err(|e| e.to_string())?;

        let mut session = Session::new().map_err(|e| e.to_string())?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(cfg.timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake().map_err(|e| format!("handshake: {e}"))?;

        match &cfg.auth {
            Auth::Password(password) => session.userauth_password(&cfg.user, password),
            Auth::KeyFile { path, passphrase } => {
                session.userauth_pubkey_file(&cfg.user, None, path, passphrase.as_deref())
            }
            Auth::Agent => session.userauth_agent(&cfg.user),
        }
        .map_err(|e| format!("authentication failed: {e}"))?;

        if !session.authenticated() {
            return Err("authentication rejected".to_string());
        }
        Ok(session)
    }
}

impl RemoteStore for SftpStore {
    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        let endpoint = self.endpoint();
        let fail = |reason: String| TransportError::Connection {
            endpoint: endpoint.clone(),
            reason,
        };
        let session = self.open_session().map_err(fail)?;
        let sftp = session
            .sftp()
            .map_err(|e| fail(format!("sftp subsystem: {e}")))?;
        Ok(Box::new(SftpSession {
            session,
            sftp: Some(sftp),
            endpoint,
        }))
    }
}

struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
    endpoint: String,
}

impl std::fmt::Debug for SftpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSession")
            .field("endpoint", &self.endpoint)
            .field("open", &self.sftp.is_some())
            .finish_non_exhaustive()
    }
}

fn is_missing(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE))
}

/// Map a failed remote lookup: a missing path is `NotFound`, anything else
/// means the transfer cannot proceed.
fn lookup_error(path: &str, err: &ssh2::Error) -> TransportError {
    if is_missing(err) {
        TransportError::NotFound {
            path: path.to_string(),
        }
    } else {
        transfer_error(path, err)
    }
}

fn transfer_error(path: &str, err: &impl std::fmt::Display) -> TransportError {
    TransportError::Transfer {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

/// Suffix the previous object is parked under while an upload replaces it.
const OLD_SUFFIX: &str = ".old";

/// Server-side renames and unlinks used to publish an upload.
trait RemoteRename {
    fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<(), ssh2::Error>;
    fn remove_file(&self, path: &str) -> Result<(), ssh2::Error>;
}

impl RemoteRename for Sftp {
    fn move_file(&self, from: &str, to: &str, overwrite: bool) -> Result<(), ssh2::Error> {
        let flags = overwrite.then_some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC);
        self.rename(Path::new(from), Path::new(to), flags)
    }

    fn remove_file(&self, path: &str) -> Result<(), ssh2::Error> {
        self.unlink(Path::new(path))
    }
}

/// Move the finished `part` upload onto `remote_path`.
///
/// SFTPv3 servers refuse to rename over an existing file, so the old object
/// is parked under [`OLD_SUFFIX`] and put back if the swap fails. On failure
/// `part` is left on the server and named in the error.
fn move_into_place(
    fs: &impl RemoteRename,
    part: &str,
    remote_path: &str,
) -> Result<(), TransportError> {
    if fs.move_file(part, remote_path, true).is_ok() {
        return Ok(());
    }
    let parked = format!("{remote_path}{OLD_SUFFIX}");
    let _ = fs.remove_file(&parked);
    let was_parked = fs.move_file(remote_path, &parked, false).is_ok();
    match fs.move_file(part, remote_path, false) {
        Ok(()) => {
            if was_parked {
                let _ = fs.remove_file(&parked);
            }
            Ok(())
        }
        Err(e) => {
            if was_parked {
                let _ = fs.move_file(&parked, remote_path, false);
            }
            Err(TransportError::Transfer {
                path: remote_path.to_string(),
                reason: format!("cannot move upload into place ({e}); it is kept at {part}"),
            })
        }
    }
}

impl SftpSession {
    fn sftp(&self) -> Result<&Sftp, TransportError> {
        self.sftp.as_ref().ok_or_else(|| TransportError::Connection {
            endpoint: self.endpoint.clone(),
            reason: "session already closed".to_string(),
        })
    }

    fn require_dir(sftp: &Sftp, path: &str) -> Result<(), TransportError> {
        let stat = sftp
            .stat(Path::new(path))
            .map_err(|e| lookup_error(path, &e))?;
        if stat.is_dir() {
            Ok(())
        } else {
            Err(TransportError::PathConflict {
                path: path.to_string(),
                reason: "exists but is not a directory".to_string(),
            })
        }
    }

    /// Create `path` and any missing ancestors.
    fn mkdir_all(sftp: &Sftp, path: &str) -> Result<(), TransportError> {
        match sftp.stat(Path::new(path)) {
            Ok(stat) if stat.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(TransportError::PathConflict {
                    path: path.to_string(),
                    reason: "exists but is not a directory".to_string(),
                });
            }
            Err(e) if is_missing(&e) => {}
            Err(e) => return Err(transfer_error(path, &e)),
        }
        let parent = remote_parent(path);
        if parent != path && parent != "/" && parent != "." {
            Self::mkdir_all(sftp, parent)?;
        }
        sftp.mkdir(Path::new(path), DIR_MODE)
            .map_err(|e| transfer_error(path, &e))
    }

    fn write_part(sftp: &Sftp, local_file: &Path, part: &str) -> Result<(), TransportError> {
        let local_error = |source| TransportError::Local {
            path: local_file.to_path_buf(),
            source,
        };
        let expected = std::fs::metadata(local_file).map_err(local_error)?.len();
        let mut reader = BufReader::new(File::open(local_file).map_err(local_error)?);
        let mut remote = sftp
            .create(Path::new(part))
            .map_err(|e| transfer_error(part, &e))?;
        let copied = pump(&mut reader, &mut remote).map_err(|e| match e {
            PumpError::Read(source) => local_error(source),
            PumpError::Write(source) => transfer_error(part, &source),
        })?;
        drop(remote);

        let written = sftp
            .stat(Path::new(part))
            .map_err(|e| transfer_error(part, &e))?
            .size
            .unwrap_or(0);
        if copied != expected || written != expected {
            return Err(short_transfer(part, written.min(copied), expected));
        }
        Ok(())
    }
}

impl RemoteSession for SftpSession {
    fn ensure_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let sftp = self.sftp()?;
        Self::require_dir(sftp, remote_parent(path))?;
        Self::mkdir_all(sftp, path)
    }

    fn upload(&mut self, local_file: &Path, remote_path: &str) -> Result<(), TransportError> {
        let sftp = self.sftp()?;
        let part = format!("{remote_path}{PART_SUFFIX}");
        if let Err(e) = Self::write_part(sftp, local_file, &part) {
            let _ = sftp.unlink(Path::new(&part));
            return Err(e);
        }
        move_into_place(sftp, &part, remote_path)
    }

    fn download(&mut self, remote_path: &str, local_file: &Path) -> Result<(), TransportError> {
        let sftp = self.sftp()?;
        let stat = sftp
            .stat(Path::new(remote_path))
            .map_err(|e| lookup_error(remote_path, &e))?;
        if stat.is_dir() {
            return Err(TransportError::PathConflict {
                path: remote_path.to_string(),
                reason: "is a directory".to_string(),
            });
        }

        let mut remote = sftp
            .open(Path::new(remote_path))
            .map_err(|e| lookup_error(remote_path, &e))?;
        let mut local = File::create(local_file).map_err(|source| TransportError::Local {
            path: local_file.to_path_buf(),
            source,
        })?;
        let copied = pump(&mut remote, &mut local).map_err(|e| match e {
            PumpError::Read(source) => transfer_error(remote_path, &source),
            PumpError::Write(source) => TransportError::Local {
                path: local_file.to_path_buf(),
                source,
            },
        })?;
        if let Some(expected) = stat.size
            && copied != expected
        {
            return Err(short_transfer(remote_path, copied, expected));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.sftp.take().is_none() {
            return Ok(());
        }
        self.session
            .disconnect(None, "dotbackup done", None)
            .map_err(|e| TransportError::Connection {
                endpoint: self.endpoint.clone(),
                reason: format!("disconnect: {e}"),
            })
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
