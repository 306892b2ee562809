#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod extract;

pub use error::{ArchiveError, Result};
pub use extract::{Compression, unpack_compressed_tar};

/// Tracing target for archive extraction.
pub const TRACING_TARGET: &str = "buildctx_archive";
