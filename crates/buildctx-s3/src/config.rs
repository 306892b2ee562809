//! Connection parameters resolved from environment-like configuration.

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Storage endpoint override (e.g. `http://minio:9000`).
pub const ENV_S3_ENDPOINT: &str = "S3_ENDPOINT";
/// Forces path-style addressing when set to `true`.
pub const ENV_S3_FORCE_PATH_STYLE: &str = "S3_FORCE_PATH_STYLE";
/// Static access key id.
pub const ENV_S3_ACCESS_KEY_ID: &str = "S3_ACCESS_KEY_ID";
/// Static secret access key.
pub const ENV_S3_SECRET_ACCESS_KEY: &str = "S3_SECRET_ACCESS_KEY";
/// Host presented to and signed for the storage endpoint.
pub const ENV_S3_HOST: &str = "S3_HOST";
/// Allows plain-HTTP endpoints when set to `true`.
pub const ENV_S3_ALLOW_HTTP: &str = "S3_ALLOW_HTTP";
/// Primary region variable.
pub const ENV_AWS_REGION: &str = "AWS_REGION";
/// Fallback region variable.
pub const ENV_AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Key/value lookup that connection parameters are resolved from.
pub trait ConfigSource {
    /// Returns the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the value under `key`, treating blank values as unset.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// Returns `true` only when the value under `key` is `true` (any case).
    fn get_flag(&self, key: &str) -> bool {
        self.get_non_empty(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl ConfigSource for Environment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl ConfigSource for [(&str, &str)] {
    fn get(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_owned())
    }
}

/// Connection parameters for the storage endpoint.
///
/// Built once per invocation and passed explicitly to every component; nothing
/// downstream reads the environment on its own.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ConnectionConfig {
    /// Storage endpoint override. Unset uses the provider's default resolution.
    #[cfg_attr(feature = "config", arg(long = "s3-endpoint", env = ENV_S3_ENDPOINT))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Put the bucket name in the URL path instead of the host.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "s3-force-path-style",
            env = ENV_S3_FORCE_PATH_STYLE,
            default_value = "false",
            action = clap::ArgAction::Set,
            value_parser = parse_flag
        )
    )]
    #[serde(default)]
    pub force_path_style: bool,

    /// Static access key id.
    #[cfg_attr(feature = "config", arg(long = "s3-access-key-id", env = ENV_S3_ACCESS_KEY_ID))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Static secret access key.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-secret-access-key", env = ENV_S3_SECRET_ACCESS_KEY, hide_env_values = true)
    )]
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,

    /// Host presented to the endpoint and covered by the request signature.
    #[cfg_attr(feature = "config", arg(long = "s3-host", env = ENV_S3_HOST))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_host: Option<String>,

    /// Signing and endpoint region. Falls back to `AWS_DEFAULT_REGION`.
    #[cfg_attr(
        feature = "config",
        arg(long = "s3-region", env = ENV_AWS_REGION, default_value_t = resolve_region(&Environment))
    )]
    #[serde(default = "default_region")]
    pub region: String,

    /// Permit plain-HTTP endpoints. Meant for local S3-compatible emulators.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "s3-allow-http",
            env = ENV_S3_ALLOW_HTTP,
            default_value = "false",
            action = clap::ArgAction::Set,
            value_parser = parse_flag
        )
    )]
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_owned()
}

/// Region from `AWS_REGION`, then `AWS_DEFAULT_REGION`, then [`DEFAULT_REGION`].
pub fn resolve_region<S: ConfigSource + ?Sized>(source: &S) -> String {
    source
        .get_non_empty(ENV_AWS_REGION)
        .or_else(|| source.get_non_empty(ENV_AWS_DEFAULT_REGION))
        .unwrap_or_else(default_region)
}

#[cfg(feature = "config")]
fn parse_flag(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            custom_host: None,
            region: default_region(),
            allow_http: false,
        }
    }
}

impl ConnectionConfig {
    /// Resolves connection parameters from `source`.
    ///
    /// Every field has a default, so this never fails: blank values count as
    /// unset and anything other than `true` counts as `false`.
    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Self {
        let config = Self {
            endpoint: source.get_non_empty(ENV_S3_ENDPOINT),
            force_path_style: source.get_flag(ENV_S3_FORCE_PATH_STYLE),
            access_key_id: source.get_non_empty(ENV_S3_ACCESS_KEY_ID),
            secret_access_key: source.get_non_empty(ENV_S3_SECRET_ACCESS_KEY),
            custom_host: source.get_non_empty(ENV_S3_HOST),
            region: resolve_region(source),
            allow_http: source.get_flag(ENV_S3_ALLOW_HTTP),
        };

        config.log();
        config
    }

    /// Resolves connection parameters from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&Environment)
    }

    /// Sets the endpoint override.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the static credentials.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets the host presented to and signed for the endpoint.
    pub fn with_custom_host(mut self, host: impl Into<String>) -> Self {
        self.custom_host = Some(host.into());
        self
    }

    /// Sets the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Enables or disables path-style addressing.
    pub fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Enables or disables plain-HTTP endpoints.
    pub fn with_allow_http(mut self, allow_http: bool) -> Self {
        self.allow_http = allow_http;
        self
    }

    /// Returns the static credentials when both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Returns whether requests must be re-signed for a custom host.
    pub fn uses_custom_host(&self) -> bool {
        self.custom_host.is_some()
    }

    /// Logs the resolved configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            endpoint = self.endpoint.as_deref().unwrap_or("<default>"),
            force_path_style = self.force_path_style,
            static_credentials = self.static_credentials().is_some(),
            custom_host = self.custom_host.as_deref().unwrap_or("<none>"),
            region = %self.region,
            allow_http = self.allow_http,
            "Resolved storage connection configuration"
        );
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("custom_host", &self.custom_host)
            .field("region", &self.region)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}
