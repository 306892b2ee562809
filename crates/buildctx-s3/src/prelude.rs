//! Prelude module for convenient imports.

pub use crate::config::{ConfigSource, ConnectionConfig};
pub use crate::error::{Error, ErrorKind, Result, TransferErrorKind};
pub use crate::fetch::{FetchOptions, ObjectFetcher};
pub use crate::location::ContextLocation;
pub use crate::unpack::{
    ContextUnpacker, DownloadTarget, Stage, UnpackError, unpack_tar_from_build_context,
};
