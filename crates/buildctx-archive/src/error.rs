//! Archive error types.

use std::io;
use std::path::PathBuf;

/// Result type for archive operations.
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// Errors that can occur while extracting an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The archive file could not be opened.
    #[error("failed to open archive {}: {source}", .path.display())]
    Open {
        /// Archive path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The archive stream is corrupt or truncated.
    #[error("failed to read archive {}: {source}", .path.display())]
    Read {
        /// Archive path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The destination directory could not be prepared.
    #[error("failed to prepare destination {}: {source}", .path.display())]
    Destination {
        /// Destination directory.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A single entry could not be written to disk.
    #[error(
        "failed to unpack {} into {}: {source}",
        .entry.display(),
        .destination.display()
    )]
    Unpack {
        /// Path of the entry inside the archive.
        entry: PathBuf,
        /// Destination directory.
        destination: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Extraction stopped before finishing, e.g. because the worker panicked.
    #[error("extraction of {} was aborted: {source}", .path.display())]
    Aborted {
        /// Archive path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl ArchiveError {
    /// Returns the underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::Open { source, .. }
            | Self::Read { source, .. }
            | Self::Destination { source, .. }
            | Self::Unpack { source, .. }
            | Self::Aborted { source, .. } => source,
        }
    }
}
