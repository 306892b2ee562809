//! Error types for build context retrieval.

use std::io;
use std::path::PathBuf;

use strum::{AsRefStr, Display, IntoStaticStr};

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for build context operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The source location could not be parsed.
    Config,
    /// The storage client could not be constructed.
    Connection,
    /// A request could not be signed.
    Auth,
    /// A local directory or file could not be created or written.
    LocalIo,
    /// The remote object could not be downloaded.
    Transfer,
    /// The downloaded archive could not be extracted.
    Extraction,
}

/// Reason a remote download failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransferErrorKind {
    /// The bucket or object does not exist.
    NotFound,
    /// The credentials were rejected or lack permission.
    AccessDenied,
    /// The connection failed or was interrupted.
    Network,
    /// Any other remote failure.
    Other,
}

impl TransferErrorKind {
    /// Classifies an HTTP status returned by the storage endpoint.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status {
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => {
                Self::AccessDenied
            }
            _ => Self::Other,
        }
    }
}

/// Errors that can occur while fetching and unpacking a build context.
///
/// Messages identify the failing stage (bucket, key or local path) and never
/// include credentials.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source URI is malformed.
    #[error("invalid build context location '{uri}': {reason}")]
    Config {
        /// The URI as given by the caller.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The storage client could not be constructed.
    #[error("failed to construct storage client: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
        /// Underlying error, if any.
        source: Option<BoxedError>,
    },

    /// A request could not be signed for the configured host.
    #[error("failed to sign request for host '{host}': {reason}")]
    Auth {
        /// The custom host the request was being signed for.
        host: String,
        /// Why signing failed.
        reason: String,
    },

    /// A local directory or file operation failed.
    #[error("local filesystem error at {}: {source}", .path.display())]
    LocalIo {
        /// Path being created or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The remote object could not be downloaded.
    #[error("failed to download s3://{bucket}/{key} ({kind}): {message}")]
    Transfer {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Classified reason.
        kind: TransferErrorKind,
        /// Description of the failure.
        message: String,
        /// Underlying error, if any.
        source: Option<BoxedError>,
    },

    /// The downloaded archive could not be extracted.
    #[error("failed to extract build context: {0}")]
    Extraction(#[from] buildctx_archive::ArchiveError),
}

impl Error {
    /// Creates a new location parsing error.
    pub fn config(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new client construction error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new signing error.
    pub fn auth(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new local filesystem error.
    pub fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Creates a new download error.
    pub fn transfer(
        bucket: impl Into<String>,
        key: impl Into<String>,
        kind: TransferErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            bucket: bucket.into(),
            key: key.into(),
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error to a connection or transfer error.
    ///
    /// Other variants carry their source structurally and are returned as is.
    pub fn with_source(mut self, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            Self::Connection { source, .. } | Self::Transfer { source, .. } => {
                *source = Some(Box::new(error));
            }
            _ => {}
        }
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::LocalIo { .. } => ErrorKind::LocalIo,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Extraction(_) => ErrorKind::Extraction,
        }
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind().into()
    }

    /// Returns the transfer reason for download errors.
    pub fn transfer_kind(&self) -> Option<TransferErrorKind> {
        match self {
            Self::Transfer { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(Error::connection("boom").kind_str(), "connection");
        assert_eq!(
            Error::local_io("/tmp/x", io::Error::other("disk")).kind_str(),
            "local_io"
        );
        assert_eq!(TransferErrorKind::AccessDenied.to_string(), "access_denied");
    }

    #[test]
    fn transfer_message_names_object() {
        let err = Error::transfer("ctx", "a/b.tar.gz", TransferErrorKind::NotFound, "404");
        let message = err.to_string();

        assert!(message.contains("s3://ctx/a/b.tar.gz"));
        assert!(message.contains("not_found"));
        assert_eq!(err.transfer_kind(), Some(TransferErrorKind::NotFound));
    }

    #[test]
    fn with_source_keeps_chain() {
        use std::error::Error as _;

        let err = Error::connection("client").with_source(io::Error::other("tls"));
        assert!(err.source().is_some());

        let err = Error::config("uri", "bad").with_source(io::Error::other("ignored"));
        assert!(err.source().is_none());
    }

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;

        assert_eq!(
            TransferErrorKind::from_status(StatusCode::NOT_FOUND),
            TransferErrorKind::NotFound
        );
        assert_eq!(
            TransferErrorKind::from_status(StatusCode::FORBIDDEN),
            TransferErrorKind::AccessDenied
        );
        assert_eq!(
            TransferErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            TransferErrorKind::Other
        );
    }
}
