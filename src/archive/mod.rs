//! Directory archiving: one compressed file per component.
//!
//! Entry names are relative to the parent of the archived directory, so the
//! first path component of every entry is the directory's own name (`fish/`,
//! `fish/config.fish`, ...). Extraction refuses any entry that would land
//! outside the destination.
mod tar_gz;
mod zip_file;

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::CodecError;
use crate::platform::Os;

pub use self::tar_gz::TarGzCodec;
pub use self::zip_file::ZipCodec;

/// On-disk archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// gzip-compressed tar.
    TarGz,
    /// Deflate zip.
    Zip,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// Native format for `os`: zip on Windows, tar.gz elsewhere.
    #[must_use]
    pub const fn for_os(os: Os) -> Self {
        match os {
            Os::Windows => Self::Zip,
            Os::Linux => Self::TarGz,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Builds and unpacks archives of one format.
pub trait ArchiveCodec: Send + Sync {
    /// Format produced by [`compress`](Self::compress).
    fn format(&self) -> ArchiveFormat;

    /// Archive `source_dir` into `dest_file`.
    ///
    /// # Errors
    ///
    /// [`CodecError::Io`] if `source_dir` is missing or not a directory, or a
    /// file cannot be read; [`CodecError::Archive`] if the archive cannot be
    /// written.
    fn compress(&self, source_dir: &Path, dest_file: &Path) -> Result<(), CodecError>;

    /// Unpack `source_file` into `dest_dir`, creating it when missing.
    ///
    /// # Errors
    ///
    /// [`CodecError::Archive`] for a corrupt archive,
    /// [`CodecError::UnsafeEntry`] for an entry escaping `dest_dir`, and
    /// [`CodecError::Io`] when writing to `dest_dir` fails.
    fn extract(&self, source_file: &Path, dest_dir: &Path) -> Result<(), CodecError>;
}

/// Codec for `format`.
#[must_use]
pub fn codec_for(format: ArchiveFormat) -> Box<dyn ArchiveCodec> {
    match format {
        ArchiveFormat::TarGz => Box::new(TarGzCodec),
        ArchiveFormat::Zip => Box::new(ZipCodec),
    }
}

/// A validated directory about to be archived.
#[derive(Debug)]
struct SourceTree {
    root: PathBuf,
    name: String,
}

impl SourceTree {
    fn open(source_dir: &Path) -> Result<Self, CodecError> {
        let root = dunce::canonicalize(source_dir).map_err(|e| CodecError::io(source_dir, e))?;
        if !root.is_dir() {
            return Err(CodecError::io(
                source_dir,
                io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CodecError::io(
                    source_dir,
                    io::Error::new(io::ErrorKind::InvalidInput, "cannot archive a root directory"),
                )
            })?;
        Ok(Self { root, name })
    }

    /// Walk the tree in sorted order, yielding each entry with its archive
    /// name. The root itself comes first.
    fn walk(
        &self,
        follow_links: bool,
    ) -> impl Iterator<Item = Result<(String, walkdir::DirEntry), CodecError>> + '_ {
        walkdir::WalkDir::new(&self.root)
            .follow_links(follow_links)
            .sort_by_file_name()
            .into_iter()
            .map(move |entry| {
                let entry = entry.map_err(|e| self.walk_error(e))?;
                let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
                Ok((entry_name(&self.name, rel), entry))
            })
    }

    fn walk_error(&self, err: walkdir::Error) -> CodecError {
        let path = err.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
        if err.loop_ancestor().is_some() {
            return CodecError::archive(path, err);
        }
        CodecError::io(path, err.into())
    }
}

/// Join `rel` under `root` with `/` separators.
fn entry_name(root: &str, rel: &Path) -> String {
    let mut name = root.to_string();
    for part in rel.components() {
        name.push('/');
        name.push_str(&part.as_os_str().to_string_lossy());
    }
    name
}

/// Relative path for an archive entry, or [`CodecError::UnsafeEntry`] if it
/// is absolute or climbs out with `..`.
fn safe_relative(entry: &Path) -> Result<PathBuf, CodecError> {
    let unsafe_entry = || CodecError::UnsafeEntry {
        entry: entry.to_string_lossy().into_owned(),
    };
    let mut out = PathBuf::new();
    for part in entry.components() {
        match part {
            Component::Normal(p) => out.push(p),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry());
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(unsafe_entry());
    }
    Ok(out)
}

/// Classify an error hit while writing extracted data: a decoding failure
/// is a bad archive, anything else is the destination's fault.
fn write_error(archive: &Path, dest: &Path, err: io::Error) -> CodecError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            CodecError::archive(archive, err)
        }
        _ => CodecError::io(dest, err),
    }
}

/// Permission bits, where the platform has them.
#[allow(clippy::unnecessary_wraps)]
fn unix_mode(meta: &std::fs::Metadata) -> Option<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        Some(meta.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        None
    }
}
