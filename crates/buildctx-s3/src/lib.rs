#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod fetch;
mod location;
mod signing;
mod unpack;

#[cfg(test)]
mod testing;

#[doc(hidden)]
pub mod prelude;

pub use config::{
    ConfigSource, ConnectionConfig, DEFAULT_REGION, ENV_AWS_DEFAULT_REGION, ENV_AWS_REGION,
    ENV_S3_ACCESS_KEY_ID, ENV_S3_ALLOW_HTTP, ENV_S3_ENDPOINT, ENV_S3_FORCE_PATH_STYLE,
    ENV_S3_HOST, ENV_S3_SECRET_ACCESS_KEY, Environment, resolve_region,
};
pub use error::{BoxedError, Error, ErrorKind, Result, TransferErrorKind};
pub use fetch::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DIRECTORY_MODE, FetchOptions, ObjectFetcher};
pub use location::{ContextLocation, S3_SCHEME};
pub use signing::{HostOverrideSigner, encode_key};
pub use unpack::{
    CONTEXT_TAR, ContextUnpacker, DEFAULT_BUILD_CONTEXT_DIR, DownloadTarget, Stage, UnpackError,
    unpack_tar_from_build_context,
};

/// Tracing target for connection configuration.
pub const TRACING_TARGET_CONFIG: &str = "buildctx_s3::config";

/// Tracing target for request signing.
pub const TRACING_TARGET_SIGNING: &str = "buildctx_s3::signing";

/// Tracing target for object downloads.
pub const TRACING_TARGET_FETCH: &str = "buildctx_s3::fetch";

/// Tracing target for the fetch-and-unpack pipeline.
pub const TRACING_TARGET_UNPACK: &str = "buildctx_s3::unpack";
