//! A plain directory standing in for the remote server.
//!
//! Used for mounted drives and in tests. Remote paths are interpreted as
//! local filesystem paths.
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::{PART_SUFFIX, PumpError, RemoteSession, RemoteStore, pump, short_transfer};
use crate::error::TransportError;

/// Store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    base: PathBuf,
}

impl LocalDirStore {
    /// Store rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl RemoteStore for LocalDirStore {
    fn endpoint(&self) -> String {
        self.base.display().to_string()
    }

    fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        Ok(Box::new(LocalDirSession))
    }
}

#[derive(Debug)]
struct LocalDirSession;

fn local_error(path: &Path) -> impl FnOnce(std::io::Error) -> TransportError + '_ {
    move |source| TransportError::Local {
        path: path.to_path_buf(),
        source,
    }
}

impl LocalDirSession {
    fn check_dir(path: &Path) -> Result<(), TransportError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(TransportError::PathConflict {
                path: path.display().to_string(),
                reason: "exists but is not a directory".to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TransportError::NotFound {
                path: path.display().to_string(),
            }),
            Err(e) => Err(local_error(path)(e)),
        }
    }

    fn write_part(local_file: &Path, part: &str) -> Result<(), TransportError> {
        let expected = fs::metadata(local_file)
            .map_err(local_error(local_file))?
            .len();
        let mut reader = BufReader::new(File::open(local_file).map_err(local_error(local_file))?);
        let mut writer = File::create(part).map_err(|e| TransportError::Transfer {
            path: part.to_string(),
            reason: e.to_string(),
        })?;
        let copied = pump(&mut reader, &mut writer).map_err(|e| match e {
            PumpError::Read(source) => local_error(local_file)(source),
            PumpError::Write(source) => TransportError::Transfer {
                path: part.to_string(),
                reason: source.to_string(),
            },
        })?;
        writer.sync_all().map_err(|e| TransportError::Transfer {
            path: part.to_string(),
            reason: e.to_string(),
        })?;
        let written = fs::metadata(part).map(|m| m.len()).unwrap_or(0);
        if copied != expected || written != expected {
            return Err(short_transfer(part, written.min(copied), expected));
        }
        Ok(())
    }
}

impl RemoteSession for LocalDirSession {
    fn ensure_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let parent = Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::check_dir(parent)?;
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(TransportError::PathConflict {
                path: path.to_string(),
                reason: "exists but is not a directory".to_string(),
            }),
            Err(_) => fs::create_dir_all(path).map_err(local_error(Path::new(path))),
        }
    }

    fn upload(&mut self, local_file: &Path, remote_path: &str) -> Result<(), TransportError> {
        let part = format!("{remote_path}{PART_SUFFIX}");
        if let Err(e) = Self::write_part(local_file, &part) {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
        if fs::rename(&part, remote_path).is_err() {
            let _ = fs::remove_file(remote_path);
            if let Err(e) = fs::rename(&part, remote_path) {
                let _ = fs::remove_file(&part);
                return Err(TransportError::Transfer {
                    path: remote_path.to_string(),
                    reason: format!("cannot replace object: {e}"),
                });
            }
        }
        Ok(())
    }

    fn download(&mut self, remote_path: &str, local_file: &Path) -> Result<(), TransportError> {
        let meta = match fs::metadata(remote_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::NotFound {
                    path: remote_path.to_string(),
                });
            }
            Err(e) => {
                return Err(TransportError::Transfer {
                    path: remote_path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        if meta.is_dir() {
            return Err(TransportError::PathConflict {
                path: remote_path.to_string(),
                reason: "is a directory".to_string(),
            });
        }

        let mut reader = BufReader::new(File::open(remote_path).map_err(|e| {
            TransportError::Transfer {
                path: remote_path.to_string(),
                reason: e.to_string(),
            }
        })?);
        let mut writer = File::create(local_file).map_err(local_error(local_file))?;
        let copied = pump(&mut reader, &mut writer).map_err(|e| match e {
            PumpError::Read(source) => TransportError::Transfer {
                path: remote_path.to_string(),
                reason: source.to_string(),
            },
            PumpError::Write(source) => local_error(local_file)(source),
        })?;
        if copied != meta.len() {
            return Err(short_transfer(remote_path, copied, meta.len()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
