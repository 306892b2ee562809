//! Bucket and object key parsed from a build context URI.

use std::fmt;

use crate::error::{Error, Result};

/// URI scheme accepted in front of the bucket name.
pub const S3_SCHEME: &str = "s3://";

/// Address of the build context archive inside the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextLocation {
    bucket: String,
    key: String,
}

impl ContextLocation {
    /// Parses `s3://bucket/path/to/context.tar.gz` or `bucket/path/to/context.tar.gz`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the scheme is not `s3://`, when the
    /// bucket or key is empty, or when the key starts with `/`. Only the slash
    /// separating bucket and key is consumed; the key is kept as given.
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let rest = match trimmed.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("s3") => rest,
            Some((scheme, _)) => {
                return Err(Error::config(
                    uri,
                    format!("unsupported scheme '{scheme}', expected '{S3_SCHEME}'"),
                ));
            }
            None => trimmed,
        };

        let Some((bucket, key)) = rest.split_once('/') else {
            return Err(Error::config(uri, "missing object key"));
        };

        if bucket.is_empty() {
            return Err(Error::config(uri, "missing bucket name"));
        }

        if key.is_empty() {
            return Err(Error::config(uri, "missing object key"));
        }
        if key.starts_with('/') {
            return Err(Error::config(uri, "object key must not start with '/'"));
        }

        Ok(Self {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        })
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the object key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ContextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl std::str::FromStr for ContextLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
