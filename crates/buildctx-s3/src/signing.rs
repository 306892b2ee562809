//! AWS Signature Version 4 for requests sent through a custom host.
//!
//! Some S3-compatible gateways only accept a request when the `Host` header and
//! the signed payload name the literal address they are reached at, which may
//! differ from the endpoint the client connects to. [`HostOverrideSigner`]
//! signs a request as if it were addressed to the configured host and presents
//! that host in the `Host` header, leaving the request URL (and therefore the
//! network destination) unchanged.

use std::collections::BTreeMap;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use jiff::Timestamp;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Request;
use reqwest::header::{AUTHORIZATION, HOST, HeaderName, HeaderValue, RANGE};
use sha2::{Digest, Sha256};

use crate::TRACING_TARGET_SIGNING;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
/// Service name covered by the credential scope.
pub const SERVICE: &str = "s3";
/// SHA-256 of an empty payload.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
/// Payload hash used when the body is streamed.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const X_AMZ_DATE: HeaderName = HeaderName::from_static("x-amz-date");
const X_AMZ_CONTENT_SHA256: HeaderName = HeaderName::from_static("x-amz-content-sha256");

/// RFC 3986 unreserved characters stay as is, everything else is escaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes an object key for use in a request path, keeping `/`.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, URI_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Signs requests for a configured custom host with static credentials.
#[derive(Clone)]
pub struct HostOverrideSigner {
    host: String,
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

impl std::fmt::Debug for HostOverrideSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostOverrideSigner")
            .field("host", &self.host)
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl HostOverrideSigner {
    /// Creates a signer for `host`.
    pub fn new(
        host: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Builds the signer required by `config`.
    ///
    /// Returns `None` when no custom host is configured, in which case the
    /// provider's own signing applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when a custom host is configured without static
    /// credentials.
    pub fn from_config(config: &ConnectionConfig) -> Result<Option<Self>> {
        let Some(host) = config.custom_host.as_deref() else {
            return Ok(None);
        };

        let Some((access_key_id, secret_access_key)) = config.static_credentials() else {
            return Err(Error::auth(
                host,
                "static credentials are required to sign for a custom host",
            ));
        };

        Ok(Some(Self::new(
            host,
            access_key_id,
            secret_access_key,
            &config.region,
        )))
    }

    /// Returns the host requests are signed for.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Signs `request` at the current time.
    pub fn sign_now(&self, request: &mut Request) -> Result<()> {
        self.sign(request, Timestamp::now())
    }

    /// Signs `request` for the custom host at `now`.
    ///
    /// On success the request carries `Host`, `x-amz-date`,
    /// `x-amz-content-sha256` and `Authorization`. The URL is never touched.
    /// On failure the request is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the host, an existing signed header or the
    /// resulting authorization is not a valid header value.
    pub fn sign(&self, request: &mut Request, now: Timestamp) -> Result<()> {
        let host = HeaderValue::from_str(&self.host)
            .map_err(|e| Error::auth(&self.host, format!("invalid host header: {e}")))?;

        let amz_date = now.strftime("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.strftime("%Y%m%d").to_string();
        let payload_hash = payload_hash(request);

        let mut signed = BTreeMap::new();
        signed.insert("host".to_owned(), self.host.clone());
        signed.insert(X_AMZ_DATE.as_str().to_owned(), amz_date.clone());
        signed.insert(X_AMZ_CONTENT_SHA256.as_str().to_owned(), payload_hash.clone());
        for (name, value) in request.headers() {
            let covered = *name == RANGE || name.as_str().starts_with("x-amz-");
            if !covered || signed.contains_key(name.as_str()) {
                continue;
            }
            let value = value.to_str().map_err(|e| {
                Error::auth(&self.host, format!("header '{name}' is not printable: {e}"))
            })?;
            signed.insert(name.as_str().to_owned(), value.trim().to_owned());
        }

        let canonical_headers: String = signed
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = signed.keys().map(String::as_str).collect::<Vec<_>>().join(";");

        let path = match request.url().path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method().as_str(),
            path,
            canonical_query(request.url()),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = self
            .signing_mac(&date_stamp, string_to_sign.as_bytes())
            .map(hex::encode)
            .map_err(|e| Error::auth(&self.host, format!("failed to derive signing key: {e}")))?;
        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        );
        let authorization = HeaderValue::from_str(&authorization)
            .map_err(|e| Error::auth(&self.host, format!("invalid authorization header: {e}")))?;
        let amz_date = HeaderValue::from_str(&amz_date)
            .map_err(|e| Error::auth(&self.host, e.to_string()))?;
        let payload_hash = HeaderValue::from_str(&payload_hash)
            .map_err(|e| Error::auth(&self.host, e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(HOST, host);
        headers.insert(X_AMZ_DATE, amz_date);
        headers.insert(X_AMZ_CONTENT_SHA256, payload_hash);
        headers.insert(AUTHORIZATION, authorization);

        tracing::trace!(
            target: TRACING_TARGET_SIGNING,
            host = %self.host,
            method = %request.method(),
            path = %path,
            signed_headers = %signed_headers,
            "Signed request for custom host"
        );

        Ok(())
    }

    /// Derives the signing key for `date_stamp` and MACs `data` with it.
    fn signing_mac(&self, date_stamp: &str, data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        let secret = format!("AWS4{}", self.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        hmac_sha256(&k_signing, data)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn payload_hash(request: &Request) -> String {
    match request.body() {
        None => EMPTY_PAYLOAD_SHA256.to_owned(),
        Some(body) => match body.as_bytes() {
            Some(bytes) => hex::encode(Sha256::digest(bytes)),
            None => UNSIGNED_PAYLOAD.to_owned(),
        },
    }
}

fn canonical_query(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            (
                utf8_percent_encode(&name, URI_COMPONENT).to_string(),
                utf8_percent_encode(&value, URI_COMPONENT).to_string(),
            )
        })
        .collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
