//! Deflate zip codec.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{Datelike as _, Timelike as _};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ArchiveCodec, ArchiveFormat, SourceTree, safe_relative, unix_mode, write_error};
use crate::error::CodecError;

/// zip archives. Symlinks are followed and their targets stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn compress(&self, source_dir: &Path, dest_file: &Path) -> Result<(), CodecError> {
        let tree = SourceTree::open(source_dir)?;
        let file = File::create(dest_file).map_err(|e| CodecError::io(dest_file, e))?;
        let mut writer = ZipWriter::new(BufWriter::new(file));

        for item in tree.walk(true) {
            let (name, entry) = item?;
            let meta = entry
                .metadata()
                .map_err(|e| CodecError::io(entry.path(), e.into()))?;
            let options = entry_options(&meta);

            if meta.is_dir() {
                writer
                    .add_directory(format!("{name}/"), options)
                    .map_err(|e| CodecError::archive(dest_file, e))?;
            } else {
                writer
                    .start_file(name, options)
                    .map_err(|e| CodecError::archive(dest_file, e))?;
                let mut input = BufReader::new(
                    File::open(entry.path()).map_err(|e| CodecError::io(entry.path(), e))?,
                );
                io::copy(&mut input, &mut writer).map_err(|e| CodecError::io(entry.path(), e))?;
            }
        }

        let mut inner = writer
            .finish()
            .map_err(|e| CodecError::archive(dest_file, e))?;
        io::Write::flush(&mut inner).map_err(|e| CodecError::archive(dest_file, e))?;
        Ok(())
    }

    fn extract(&self, source_file: &Path, dest_dir: &Path) -> Result<(), CodecError> {
        let file = File::open(source_file).map_err(|e| CodecError::io(source_file, e))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| CodecError::archive(source_file, e))?;

        for name in archive.file_names() {
            safe_relative(Path::new(name))?;
        }

        fs::create_dir_all(dest_dir).map_err(|e| CodecError::io(dest_dir, e))?;

        // Directory modes are applied last so a read-only directory does not
        // block writing its own children.
        let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| CodecError::archive(source_file, e))?;
            let out = dest_dir.join(safe_relative(Path::new(entry.name()))?);

            if entry.is_dir() {
                fs::create_dir_all(&out).map_err(|e| CodecError::io(&out, e))?;
                if let Some(mode) = entry.unix_mode() {
                    dir_modes.push((out, mode));
                }
                continue;
            }

            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent).map_err(|e| CodecError::io(parent, e))?;
            }
            let mut target = File::create(&out).map_err(|e| CodecError::io(&out, e))?;
            io::copy(&mut entry, &mut target).map_err(|e| write_error(source_file, &out, e))?;
            if let Some(mode) = entry.unix_mode() {
                set_mode(&out, mode)?;
            }
        }

        for (dir, mode) in dir_modes.into_iter().rev() {
            set_mode(&dir, mode)?;
        }
        Ok(())
    }
}

fn entry_options(meta: &fs::Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(mode) = unix_mode(meta) {
        options = options.unix_permissions(mode);
    }
    if let Some(time) = modified_time(meta) {
        options = options.last_modified_time(time);
    }
    options
}

/// Local mtime as a DOS timestamp; `None` outside the 1980..2107 range.
fn modified_time(meta: &fs::Metadata) -> Option<zip::DateTime> {
    let local: chrono::DateTime<chrono::Local> = meta.modified().ok()?.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        u8::try_from(local.month()).ok()?,
        u8::try_from(local.day()).ok()?,
        u8::try_from(local.hour()).ok()?,
        u8::try_from(local.minute()).ok()?,
        u8::try_from(local.second()).ok()?,
    )
    .ok()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), CodecError> {
    use std::os::unix::fs::PermissionsExt as _;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| CodecError::io(path, e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn set_mode(_path: &Path, _mode: u32) -> Result<(), CodecError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::test_support::sample_tree;
    use crate::error::ErrorKind;
    use std::io::Write as _;

    fn raw_archive(path: &Path, name: &str) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        writer
            .start_file(name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"evil").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn entries_are_prefixed_with_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());
        let out = tmp.path().join("fish.zip");
        ZipCodec.compress(&src, &out).unwrap();

        let archive = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "fish/",
                "fish/conf.d/",
                "fish/conf.d/abbr.fish",
                "fish/config.fish",
                "fish/functions/",
            ]
        );
    }

    #[test]
    fn parent_dir_entry_is_rejected_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        raw_archive(&archive, "../evil.txt");
        let dest = tmp.path().join("dest");

        let err = ZipCodec.extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, CodecError::UnsafeEntry { .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::Archive);
        assert!(!tmp.path().join("evil.txt").exists());
        assert!(!dest.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());
        std::os::unix::fs::symlink("config.fish", src.join("link.fish")).unwrap();
        let out = tmp.path().join("fish.zip");
        ZipCodec.compress(&src, &out).unwrap();

        let dest = tmp.path().join("dest");
        ZipCodec.extract(&out, &dest).unwrap();
        let copied = dest.join("fish/link.fish");
        assert!(!copied.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read(copied).unwrap(), b"set -x A 1");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_archive_error() {
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());
        std::os::unix::fs::symlink("..", src.join("functions").join("up")).unwrap();
        let err = ZipCodec
            .compress(&src, &tmp.path().join("fish.zip"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Archive, "{err}");
    }
}
