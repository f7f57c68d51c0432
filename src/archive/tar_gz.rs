//! gzip-compressed tar codec.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, EntryType, Header, HeaderMode};

use super::{ArchiveCodec, ArchiveFormat, SourceTree, safe_relative, write_error};
use crate::error::CodecError;

/// tar.gz archives. Symlinks are stored as links; owner ids are zeroed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzCodec;

impl ArchiveCodec for TarGzCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    fn compress(&self, source_dir: &Path, dest_file: &Path) -> Result<(), CodecError> {
        let tree = SourceTree::open(source_dir)?;
        let file = File::create(dest_file).map_err(|e| CodecError::io(dest_file, e))?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);

        for item in tree.walk(false) {
            let (name, entry) = item?;
            append_entry(&mut builder, &name, entry.path(), dest_file)?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| CodecError::archive(dest_file, e))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| CodecError::archive(dest_file, e))?;
        io::Write::flush(&mut writer).map_err(|e| CodecError::archive(dest_file, e))?;
        Ok(())
    }

    fn extract(&self, source_file: &Path, dest_dir: &Path) -> Result<(), CodecError> {
        // Reading every header first surfaces corruption and unsafe names
        // before the destination is touched.
        check_entries(source_file)?;

        fs::create_dir_all(dest_dir).map_err(|e| CodecError::io(dest_dir, e))?;
        let mut archive = open(source_file)?;
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);
        archive.set_overwrite(true);

        let entries = archive
            .entries()
            .map_err(|e| CodecError::archive(source_file, e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| CodecError::archive(source_file, e))?;
            let unpacked = entry
                .unpack_in(dest_dir)
                .map_err(|e| write_error(source_file, dest_dir, e))?;
            if !unpacked {
                let name = entry.path().map_or_else(
                    |_| String::from("<unreadable>"),
                    |p| p.to_string_lossy().into_owned(),
                );
                return Err(CodecError::UnsafeEntry { entry: name });
            }
        }
        Ok(())
    }
}

fn open(source_file: &Path) -> Result<Archive<GzDecoder<BufReader<File>>>, CodecError> {
    let file = File::open(source_file).map_err(|e| CodecError::io(source_file, e))?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn check_entries(source_file: &Path) -> Result<(), CodecError> {
    let mut archive = open(source_file)?;
    let entries = archive
        .entries()
        .map_err(|e| CodecError::archive(source_file, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CodecError::archive(source_file, e))?;
        let path = entry
            .path()
            .map_err(|e| CodecError::archive(source_file, e))?;
        safe_relative(&path)?;
    }
    Ok(())
}

fn append_entry<W: io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    path: &Path,
    dest_file: &Path,
) -> Result<(), CodecError> {
    let meta = fs::symlink_metadata(path).map_err(|e| CodecError::io(path, e))?;
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&meta, HeaderMode::Complete);
    header.set_uid(0);
    header.set_gid(0);

    let file_type = meta.file_type();
    let appended = if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(|e| CodecError::io(path, e))?;
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        builder.append_link(&mut header, name, &target)
    } else if file_type.is_dir() {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder.append_data(&mut header, name, io::empty())
    } else {
        let file = File::open(path).map_err(|e| CodecError::io(path, e))?;
        builder.append_data(&mut header, name, BufReader::new(file))
    };
    appended.map_err(|e| CodecError::archive(dest_file, e))
}
