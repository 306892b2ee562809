//! Fetch-then-extract pipeline for a remote build context.

use std::path::{Path, PathBuf};

use buildctx_archive::ArchiveError;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::TRACING_TARGET_UNPACK;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, ObjectFetcher};
use crate::location::ContextLocation;

/// Directory the build context is unpacked into by default.
pub const DEFAULT_BUILD_CONTEXT_DIR: &str = "/var/lib/buildctx/context";
/// File name of the downloaded archive inside the target directory.
pub const CONTEXT_TAR: &str = "context.tar.gz";

/// Pipeline stages, in order.
///
/// A failure is reported with the last stage that was reached before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, Display)]
#[derive(Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing has been done yet.
    Start,
    /// The source URI has been parsed into bucket and key.
    LocationResolved,
    /// The storage client has been constructed.
    ClientReady,
    /// The archive has been written to disk.
    Downloaded,
    /// The archive has been unpacked.
    Extracted,
    /// The pipeline finished.
    Done,
}

/// Local directory the context is unpacked into, and the archive kept beside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    directory: PathBuf,
    archive_path: PathBuf,
}

impl DownloadTarget {
    /// Creates a target that downloads to `directory/context.tar.gz`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let archive_path = directory.join(CONTEXT_TAR);
        Self {
            directory,
            archive_path,
        }
    }

    /// Returns the extraction directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the path the archive is downloaded to.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }
}

impl Default for DownloadTarget {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_CONTEXT_DIR)
    }
}

/// Failure of [`ContextUnpacker::unpack`].
#[derive(Debug, thiserror::Error)]
#[error("build context {stage} stage failed: {source}")]
pub struct UnpackError {
    /// Last stage reached before the failure.
    pub stage: Stage,
    /// Target directory, once the download stage has started.
    pub directory: Option<PathBuf>,
    /// Underlying error.
    #[source]
    pub source: Error,
}

impl UnpackError {
    fn new(stage: Stage, directory: Option<&Path>, source: Error) -> Self {
        tracing::error!(
            target: TRACING_TARGET_UNPACK,
            stage = %stage,
            kind = source.kind_str(),
            error = %source,
            "Build context retrieval failed"
        );

        Self {
            stage,
            directory: directory.map(Path::to_path_buf),
            source,
        }
    }

    /// Returns the underlying error.
    pub fn error(&self) -> &Error {
        &self.source
    }

    /// Consumes the failure and returns the underlying error.
    pub fn into_error(self) -> Error {
        self.source
    }
}

/// Downloads a build context archive and unpacks it into a target directory.
#[derive(Debug, Clone)]
pub struct ContextUnpacker {
    config: ConnectionConfig,
    target: DownloadTarget,
    options: FetchOptions,
}

impl ContextUnpacker {
    /// Creates an unpacker with explicit connection settings and target.
    pub fn new(config: ConnectionConfig, target: DownloadTarget) -> Self {
        Self {
            config,
            target,
            options: FetchOptions::default(),
        }
    }

    /// Creates an unpacker configured from the process environment with the
    /// default target directory.
    pub fn from_env() -> Self {
        Self::new(ConnectionConfig::from_env(), DownloadTarget::default())
    }

    /// Replaces the download tuning options.
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the download target.
    pub fn target(&self) -> &DownloadTarget {
        &self.target
    }

    /// Downloads the archive named by `source_uri` and unpacks it.
    ///
    /// Returns the directory containing the extracted context. Nothing is
    /// retried and partial files are left in place; the next run truncates
    /// them.
    ///
    /// # Errors
    ///
    /// Returns an [`UnpackError`] naming the stage that failed.
    #[tracing::instrument(
        skip(self),
        target = TRACING_TARGET_UNPACK,
        fields(directory = %self.target.directory().display())
    )]
    pub async fn unpack(&self, source_uri: &str) -> Result<PathBuf, UnpackError> {
        tracing::debug!(
            target: TRACING_TARGET_UNPACK,
            uri = %source_uri,
            stage = %Stage::Start,
            "Retrieving build context"
        );

        let location = ContextLocation::parse(source_uri)
            .map_err(|e| UnpackError::new(Stage::Start, None, e))?;
        self.advance(Stage::LocationResolved);

        let fetcher = ObjectFetcher::connect(&self.config, location.bucket())
            .map_err(|e| UnpackError::new(Stage::LocationResolved, None, e))?
            .with_options(self.options);
        self.advance(Stage::ClientReady);

        let directory = self.target.directory();
        let bytes = fetcher
            .fetch(location.key(), self.target.archive_path())
            .await
            .map_err(|e| UnpackError::new(Stage::ClientReady, Some(directory), e))?;
        self.advance(Stage::Downloaded);

        let entries = self
            .extract()
            .await
            .map_err(|e| UnpackError::new(Stage::Downloaded, Some(directory), e))?;
        self.advance(Stage::Extracted);

        tracing::info!(
            target: TRACING_TARGET_UNPACK,
            location = %location,
            directory = %directory.display(),
            bytes,
            entries,
            "Build context unpacked"
        );
        self.advance(Stage::Done);

        Ok(directory.to_path_buf())
    }

    async fn extract(&self) -> Result<usize> {
        let archive = self.target.archive_path().to_path_buf();
        let directory = self.target.directory().to_path_buf();

        let joined = tokio::task::spawn_blocking(move || {
            buildctx_archive::unpack_compressed_tar(&archive, &directory)
        })
        .await;

        match joined {
            Ok(result) => Ok(result?),
            Err(join) => Err(aborted(self.target.archive_path(), join)),
        }
    }

    fn advance(&self, stage: Stage) {
        tracing::trace!(
            target: TRACING_TARGET_UNPACK,
            stage = %stage,
            directory = %self.target.directory().display(),
            "Stage reached"
        );
    }
}

/// Extraction that never returned is still an extraction failure.
fn aborted(archive: &Path, join: tokio::task::JoinError) -> Error {
    Error::Extraction(ArchiveError::Aborted {
        path: archive.to_path_buf(),
        source: std::io::Error::other(join),
    })
}

/// Downloads the build context at `source_uri` into the default directory and
/// unpacks it.
///
/// Connection settings are read from the process environment once per call.
///
/// # Errors
///
/// Returns an [`UnpackError`] naming the stage that failed.
pub async fn unpack_tar_from_build_context(source_uri: &str) -> Result<PathBuf, UnpackError> {
    ContextUnpacker::from_env().unpack(source_uri).await
}
