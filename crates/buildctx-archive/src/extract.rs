//! Tarball extraction with compression detection.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::TRACING_TARGET;
use crate::error::{ArchiveError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression applied on top of the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip (`.tar.gz`, `.tgz`).
    Gzip,
    /// Uncompressed tar.
    None,
}

impl Compression {
    /// Detects the compression from the leading bytes and rewinds the reader.
    pub fn detect<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
        reader
            .by_ref()
            .take(GZIP_MAGIC.len() as u64)
            .read_to_end(&mut magic)?;
        reader.seek(SeekFrom::Start(0))?;

        if magic == GZIP_MAGIC {
            Ok(Self::Gzip)
        } else {
            Ok(Self::None)
        }
    }

    /// Returns the name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::None => "none",
        }
    }
}

/// Decompresses and untars `archive` into `destination`.
///
/// The destination is created if missing and existing files are overwritten.
/// Entries whose path would land outside of `destination` are skipped.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or decoded, or if an entry
/// cannot be written.
pub fn unpack_compressed_tar(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<usize> {
    let archive = archive.as_ref();
    let destination = destination.as_ref();

    let mut file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let compression = Compression::detect(&mut file).map_err(|source| ArchiveError::Read {
        path: archive.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(destination).map_err(|source| ArchiveError::Destination {
        path: destination.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        target: TRACING_TARGET,
        archive = %archive.display(),
        destination = %destination.display(),
        compression = compression.as_str(),
        "Unpacking archive"
    );

    let reader = BufReader::new(file);
    let entries = match compression {
        Compression::Gzip => unpack_entries(GzDecoder::new(reader), archive, destination)?,
        Compression::None => unpack_entries(reader, archive, destination)?,
    };

    tracing::info!(
        target: TRACING_TARGET,
        archive = %archive.display(),
        destination = %destination.display(),
        entries,
        "Archive unpacked"
    );

    Ok(entries)
}

fn unpack_entries<R: Read>(reader: R, archive: &Path, destination: &Path) -> Result<usize> {
    let read_error = |source| ArchiveError::Read {
        path: archive.to_path_buf(),
        source,
    };

    let mut tarball = Archive::new(reader);
    tarball.set_preserve_permissions(true);
    tarball.set_overwrite(true);

    let mut unpacked = 0;
    for entry in tarball.entries().map_err(read_error)? {
        let mut entry = entry.map_err(read_error)?;
        let entry_path = entry.path().map_err(read_error)?.into_owned();

        let written = entry
            .unpack_in(destination)
            .map_err(|source| ArchiveError::Unpack {
                entry: entry_path.clone(),
                destination: destination.to_path_buf(),
                source,
            })?;

        if written {
            unpacked += 1;
        } else {
            tracing::warn!(
                target: TRACING_TARGET,
                entry = %entry_path.display(),
                "Skipped archive entry outside of destination"
            );
        }
    }

    Ok(unpacked)
}
