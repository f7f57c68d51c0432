//! Local filesystem helpers shared by the pipelines.
use std::fs;
use std::io::{self, BufReader, Read as _};
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};

/// `<path>.bak`, the rollback copy of a restored directory.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Whether anything (including a broken symlink) exists at `path`.
#[must_use]
pub fn exists_no_follow(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Remove whatever is at `path`: a directory tree, a file or a symlink.
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Recursively copy a directory tree, keeping permission bits.
///
/// Symlinks are recreated as symlinks on Unix; elsewhere their targets are
/// copied.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() && copy_symlink(&src_path, &dst_path)? {
            continue;
        }
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            // fs::copy carries the permission bits along
            fs::copy(&src_path, &dst_path)?;
        }
    }
    fs::set_permissions(dst, fs::metadata(src)?.permissions())
}

/// Recreate the link at `dst`. Returns `false` where links are not copied.
#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<bool> {
    let target = fs::read_link(src)?;
    remove_existing(dst)?;
    std::os::unix::fs::symlink(target, dst)?;
    Ok(true)
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn copy_symlink(_src: &Path, _dst: &Path) -> io::Result<bool> {
    Ok(false)
}

/// Hex SHA-256 of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(buf.get(..n).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}
