//! Single-object download from S3-compatible storage to local disk.
//!
//! Two transports sit behind [`ObjectFetcher`]:
//!
//! - Without a custom host the object is read through an [`opendal`] S3
//!   operator. Credentials come from the static pair when configured and from
//!   the provider's default resolution chain otherwise. Large objects are read
//!   as concurrent ranged parts.
//! - With a custom host every request goes through [`reqwest`] and is signed by
//!   [`HostOverrideSigner`] just before it is sent.

use std::path::Path;
use std::pin::pin;
use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use opendal::{Operator, services};
use tokio::fs::{DirBuilder, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::TRACING_TARGET_FETCH;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result, TransferErrorKind};
use crate::signing::{HostOverrideSigner, encode_key};

/// Default number of concurrent part downloads.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default size of a single downloaded part (8 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Permission bits for directories created on the way to a destination.
pub const DIRECTORY_MODE: u32 = 0o750;

const WRITE_BUFFER_SIZE: usize = 256 * 1024;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Tuning knobs for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum number of parts in flight at once.
    pub concurrency: usize,
    /// Size of each ranged part in bytes.
    pub chunk_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FetchOptions {
    /// Sets the number of concurrent parts (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the part size in bytes (at least one).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[derive(Clone)]
enum Transport {
    /// Provider-signed access through opendal.
    Provider(Operator),
    /// Requests re-signed for a custom host.
    HostOverride {
        http: reqwest::Client,
        signer: HostOverrideSigner,
        endpoint: Url,
        path_style: bool,
    },
}

/// Downloads objects from a single bucket.
#[derive(Clone)]
pub struct ObjectFetcher {
    bucket: String,
    transport: Transport,
    options: FetchOptions,
}

impl std::fmt::Debug for ObjectFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFetcher")
            .field("bucket", &self.bucket)
            .field("custom_host", &self.custom_host())
            .field("options", &self.options)
            .finish()
    }
}

impl ObjectFetcher {
    /// Builds a fetcher for `bucket` from `config`.
    ///
    /// Without a custom host, object paths are normalized by the storage
    /// operator, so keys containing empty, `.` or `..` segments, or ending in
    /// `/`, are refused by [`ObjectFetcher::fetch`].
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] when the endpoint is malformed, uses plain HTTP
    ///   without [`ConnectionConfig::allow_http`], or the client cannot be built.
    /// - [`Error::Auth`] when a custom host is configured without static
    ///   credentials.
    pub fn connect(config: &ConnectionConfig, bucket: &str) -> Result<Self> {
        let endpoint = resolve_endpoint(config)?;

        let transport = match HostOverrideSigner::from_config(config)? {
            Some(signer) => {
                let endpoint = match endpoint {
                    Some(endpoint) => endpoint,
                    None => default_endpoint(&config.region)?,
                };
                let http = reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(|e| Error::connection("failed to build HTTP client").with_source(e))?;

                Transport::HostOverride {
                    http,
                    signer,
                    endpoint,
                    path_style: config.force_path_style,
                }
            }
            None => Transport::Provider(build_operator(config, bucket, endpoint.as_ref())?),
        };

        let fetcher = Self {
            bucket: bucket.to_owned(),
            transport,
            options: FetchOptions::default(),
        };

        tracing::debug!(
            target: TRACING_TARGET_FETCH,
            bucket = %fetcher.bucket,
            custom_host = fetcher.custom_host().unwrap_or("<none>"),
            "Storage client ready"
        );

        Ok(fetcher)
    }

    /// Replaces the download tuning options.
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the bucket this fetcher reads from.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the download tuning options.
    pub fn options(&self) -> FetchOptions {
        self.options
    }

    /// Returns the custom host requests are signed for, if any.
    pub fn custom_host(&self) -> Option<&str> {
        match &self.transport {
            Transport::Provider(_) => None,
            Transport::HostOverride { signer, .. } => Some(signer.host()),
        }
    }

    /// Downloads `key` into the file at `destination` and returns its size.
    ///
    /// Missing parent directories are created with mode `0o750` and an
    /// existing file is truncated before any data is written. If the transfer
    /// fails midway the file is left incomplete.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the key cannot be addressed without being
    ///   rewritten (see [`ObjectFetcher::connect`]); nothing is touched.
    /// - [`Error::LocalIo`] when the directory or file cannot be created or
    ///   written.
    /// - [`Error::Transfer`] when the object cannot be read.
    /// - [`Error::Auth`] when the request cannot be signed.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_FETCH,
        fields(bucket = %self.bucket, key = %key, destination = %destination.display())
    )]
    pub async fn fetch(&self, key: &str, destination: &Path) -> Result<u64> {
        let started = Instant::now();

        if let Transport::Provider(_) = &self.transport {
            check_operator_key(&self.bucket, key)?;
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_directory(parent).await?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(destination)
            .await
            .map_err(|e| Error::local_io(destination, e))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let written = match &self.transport {
            Transport::Provider(operator) => {
                self.fetch_with_operator(operator, key, &mut writer, destination)
                    .await?
            }
            Transport::HostOverride {
                http,
                signer,
                endpoint,
                path_style,
            } => {
                let url = object_url(endpoint, *path_style, &self.bucket, key)?;
                self.fetch_with_signer(http, signer, url, key, &mut writer, destination)
                    .await?
            }
        };

        writer
            .flush()
            .await
            .map_err(|e| Error::local_io(destination, e))?;

        tracing::info!(
            target: TRACING_TARGET_FETCH,
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Object downloaded"
        );

        Ok(written)
    }

    async fn fetch_with_operator(
        &self,
        operator: &Operator,
        key: &str,
        writer: &mut BufWriter<File>,
        destination: &Path,
    ) -> Result<u64> {
        let reader = operator
            .reader_with(key)
            .concurrent(self.options.concurrency)
            .chunk(self.options.chunk_size)
            .await
            .map_err(|e| self.operator_error(key, e))?;
        let stream = reader
            .into_bytes_stream(..)
            .await
            .map_err(|e| self.operator_error(key, e))?;

        copy_stream(stream, writer, destination, |e: std::io::Error| {
            let kind = match e.kind() {
                std::io::ErrorKind::NotFound => TransferErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => TransferErrorKind::AccessDenied,
                _ => TransferErrorKind::Network,
            };
            Error::transfer(&self.bucket, key, kind, "object stream interrupted").with_source(e)
        })
        .await
    }

    async fn fetch_with_signer(
        &self,
        http: &reqwest::Client,
        signer: &HostOverrideSigner,
        url: Url,
        key: &str,
        writer: &mut BufWriter<File>,
        destination: &Path,
    ) -> Result<u64> {
        let mut request = http.get(url).build().map_err(|e| {
            Error::transfer(&self.bucket, key, TransferErrorKind::Other, "invalid request")
                .with_source(e)
        })?;
        signer.sign_now(&mut request)?;

        let response = http.execute(request).await.map_err(|e| {
            Error::transfer(&self.bucket, key, TransferErrorKind::Network, "request failed")
                .with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transfer(
                &self.bucket,
                key,
                TransferErrorKind::from_status(status),
                format!("storage endpoint responded with {status}"),
            ));
        }

        let expected = response.content_length();
        let written = copy_stream(response.bytes_stream(), writer, destination, |e| {
            Error::transfer(
                &self.bucket,
                key,
                TransferErrorKind::Network,
                "object stream interrupted",
            )
            .with_source(e)
        })
        .await?;

        match expected {
            Some(expected) if expected != written => Err(Error::transfer(
                &self.bucket,
                key,
                TransferErrorKind::Network,
                format!("received {written} of {expected} bytes"),
            )),
            _ => Ok(written),
        }
    }

    fn operator_error(&self, key: &str, error: opendal::Error) -> Error {
        let kind = match error.kind() {
            opendal::ErrorKind::NotFound => TransferErrorKind::NotFound,
            opendal::ErrorKind::PermissionDenied => TransferErrorKind::AccessDenied,
            _ if error.is_temporary() => TransferErrorKind::Network,
            _ => TransferErrorKind::Other,
        };
        Error::transfer(&self.bucket, key, kind, error.kind().to_string()).with_source(error)
    }
}

/// Refuses keys the operator would normalize into a different object path.
fn check_operator_key(bucket: &str, key: &str) -> Result<()> {
    let rewritten = key.is_empty()
        || key.ends_with('/')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if rewritten {
        return Err(Error::config(
            format!("s3://{bucket}/{key}"),
            "object key has empty, '.' or '..' segments that path normalization would rewrite",
        ));
    }

    Ok(())
}

/// Parses the configured endpoint, enforcing the plain-HTTP opt-in.
///
/// An endpoint without a scheme gets `http://` when plain HTTP is allowed and
/// `https://` otherwise.
fn resolve_endpoint(config: &ConnectionConfig) -> Result<Option<Url>> {
    let Some(raw) = config.endpoint.as_deref().map(str::trim) else {
        return Ok(None);
    };

    let candidate = if raw.contains("://") {
        raw.to_owned()
    } else if config.allow_http {
        format!("http://{raw}")
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|e| {
        Error::connection(format!("invalid storage endpoint '{raw}'")).with_source(e)
    })?;

    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        "http" => {
            return Err(Error::connection(format!(
                "plain-HTTP endpoint '{raw}' requires S3_ALLOW_HTTP=true"
            )));
        }
        scheme => {
            return Err(Error::connection(format!(
                "unsupported endpoint scheme '{scheme}'"
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(Error::connection(format!(
            "storage endpoint '{raw}' has no host"
        )));
    }

    Ok(Some(url))
}

fn default_endpoint(region: &str) -> Result<Url> {
    let raw = format!("https://s3.{region}.amazonaws.com");
    Url::parse(&raw)
        .map_err(|e| Error::connection(format!("invalid region '{region}'")).with_source(e))
}

/// Address of `key` at `endpoint` in path or virtual-host style.
fn object_url(endpoint: &Url, path_style: bool, bucket: &str, key: &str) -> Result<Url> {
    let base = endpoint.path().trim_end_matches('/');
    let key = encode_key(key);

    let mut url = endpoint.clone();
    if path_style {
        url.set_path(&format!("{base}/{bucket}/{key}"));
    } else {
        let host = endpoint.host_str().unwrap_or_default();
        url.set_host(Some(&format!("{bucket}.{host}"))).map_err(|e| {
            Error::connection(format!("bucket '{bucket}' is not a valid host label"))
                .with_source(e)
        })?;
        url.set_path(&format!("{base}/{key}"));
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

fn build_operator(config: &ConnectionConfig, bucket: &str, endpoint: Option<&Url>) -> Result<Operator> {
    let mut builder = services::S3::default().bucket(bucket).region(&config.region);

    if let Some(endpoint) = endpoint {
        builder = builder.endpoint(endpoint.as_str().trim_end_matches('/'));
    }

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        builder = builder
            .access_key_id(access_key_id)
            .secret_access_key(secret_access_key);
    }

    if !config.force_path_style {
        builder = builder.enable_virtual_host_style();
    }

    Operator::new(builder)
        .map(|op| op.finish())
        .map_err(|e| Error::connection("failed to build storage operator").with_source(e))
}

async fn create_directory(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIRECTORY_MODE);

    builder
        .create(path)
        .await
        .map_err(|e| Error::local_io(path, e))
}

async fn copy_stream<S, E>(
    stream: S,
    writer: &mut BufWriter<File>,
    destination: &Path,
    on_error: impl Fn(E) -> Error,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
{
    let mut stream = pin!(stream);
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(&on_error)?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| Error::local_io(destination, e))?;
        written += chunk.len() as u64;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::{ACCESS_KEY, ObjectServer};

    const BUCKET: &str = "contexts";

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn endpoint_scheme_rules() {
        let config = ConnectionConfig::default().with_endpoint("minio:9000");
        let url = resolve_endpoint(&config).unwrap().unwrap();
        assert_eq!(url.scheme(), "https");

        let url = resolve_endpoint(&config.clone().with_allow_http(true))
            .unwrap()
            .unwrap();
        assert_eq!(url.scheme(), "http");

        let config = ConnectionConfig::default().with_endpoint("http://minio:9000");
        let err = resolve_endpoint(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(resolve_endpoint(&config.with_allow_http(true)).is_ok());

        let config = ConnectionConfig::default().with_endpoint("ftp://minio");
        assert_eq!(resolve_endpoint(&config).unwrap_err().kind(), ErrorKind::Connection);

        assert!(resolve_endpoint(&ConnectionConfig::default()).unwrap().is_none());
    }

    #[test]
    fn object_url_styles() {
        let endpoint = Url::parse("https://storage.example.com:9000").unwrap();

        let url = object_url(&endpoint, true, "ctx", "a b/context.tar.gz").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.example.com:9000/ctx/a%20b/context.tar.gz"
        );

        let url = object_url(&endpoint, false, "ctx", "context.tar.gz").unwrap();
        assert_eq!(url.as_str(), "https://ctx.storage.example.com:9000/context.tar.gz");
    }

    #[test]
    fn custom_host_requires_credentials() {
        let config = ConnectionConfig::default().with_custom_host("storage.internal");
        let err = ObjectFetcher::connect(&config, BUCKET).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[test]
    fn options_are_clamped() {
        let options = FetchOptions::default().with_concurrency(0).with_chunk_size(0);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.chunk_size, 1);
        assert_eq!(FetchOptions::default().concurrency, DEFAULT_CONCURRENCY);
    }

    #[tokio::test]
    async fn provider_download_writes_object() {
        let server = ObjectServer::start().await;
        let data = payload(300 * 1024);
        server.put(BUCKET, "ctx/context.tar.gz", data.clone());

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested/deeper/context.tar.gz");
        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET)
            .unwrap()
            .with_options(FetchOptions::default().with_chunk_size(64 * 1024));
        assert!(fetcher.custom_host().is_none());

        let written = fetcher.fetch("ctx/context.tar.gz", &destination).await.unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), data);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_directories_are_not_world_accessible() {
        use std::os::unix::fs::PermissionsExt;

        let server = ObjectServer::start().await;
        server.put(BUCKET, "context.tar.gz", b"hello".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("a/b/context.tar.gz");
        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET).unwrap();
        fetcher.fetch("context.tar.gz", &destination).await.unwrap();

        for created in [dir.path().join("a"), dir.path().join("a/b")] {
            let mode = std::fs::metadata(&created).unwrap().permissions().mode();
            assert_eq!(mode & 0o007, 0, "{}", created.display());
        }
    }

    #[tokio::test]
    async fn existing_file_is_truncated() {
        let server = ObjectServer::start().await;
        server.put(BUCKET, "context.tar.gz", b"short".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("context.tar.gz");
        std::fs::write(&destination, vec![0xAA; 4096]).unwrap();

        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET).unwrap();
        fetcher.fetch("context.tar.gz", &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"short");
    }

    #[tokio::test]
    async fn provider_missing_object_is_not_found() {
        let server = ObjectServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("context.tar.gz");

        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET).unwrap();
        let err = fetcher.fetch("missing.tar.gz", &destination).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert_eq!(err.transfer_kind(), Some(TransferErrorKind::NotFound));
    }

    #[tokio::test]
    async fn custom_host_is_presented_and_signed() {
        let server = ObjectServer::start().await;
        let data = payload(128 * 1024);
        server.put(BUCKET, "ctx/context.tar.gz", data.clone());

        let config = server.config().with_custom_host("storage.internal:9000");
        let fetcher = ObjectFetcher::connect(&config, BUCKET).unwrap();
        assert_eq!(fetcher.custom_host(), Some("storage.internal:9000"));

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("context.tar.gz");
        let written = fetcher.fetch("ctx/context.tar.gz", &destination).await.unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), data);

        let hosts = server.hosts();
        assert!(!hosts.is_empty());
        assert!(hosts.iter().all(|host| host == "storage.internal:9000"));

        let authorizations = server.authorizations();
        assert!(authorizations.iter().all(|auth| {
            auth.contains(&format!("Credential={ACCESS_KEY}/")) && auth.contains("host")
        }));
    }

    #[tokio::test]
    async fn custom_host_maps_status_codes() {
        let server = ObjectServer::start().await;
        server.put(BUCKET, "secret.tar.gz", b"nope".to_vec());
        server.forbid(BUCKET, "secret.tar.gz");

        let config = server.config().with_custom_host("storage.internal");
        let fetcher = ObjectFetcher::connect(&config, BUCKET).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("context.tar.gz");

        let err = fetcher.fetch("secret.tar.gz", &destination).await.unwrap_err();
        assert_eq!(err.transfer_kind(), Some(TransferErrorKind::AccessDenied));

        let err = fetcher.fetch("missing.tar.gz", &destination).await.unwrap_err();
        assert_eq!(err.transfer_kind(), Some(TransferErrorKind::NotFound));
    }

    #[test]
    fn operator_keys_must_be_normalized() {
        for key in ["context.tar.gz", "a/b/context.tar.gz", "a.b/..c/context.tar.gz"] {
            assert!(check_operator_key(BUCKET, key).is_ok(), "{key}");
        }
        for key in ["a//b.tar.gz", "/a.tar.gz", "a/", "a/./b", "a/../b", ".."] {
            let err = check_operator_key(BUCKET, key).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{key}");
        }
    }

    #[tokio::test]
    async fn provider_never_reads_a_neighbouring_object() {
        let server = ObjectServer::start().await;
        server.put(BUCKET, "a/b.tar.gz", b"WRONG-OBJECT".to_vec());
        server.put(BUCKET, "a//b.tar.gz", b"right".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/context.tar.gz");

        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET).unwrap();
        let err = fetcher.fetch("a//b.tar.gz", &destination).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(server.request_count(), 0);
        assert!(!destination.exists());

        let config = server.config().with_custom_host("storage.internal");
        let fetcher = ObjectFetcher::connect(&config, BUCKET).unwrap();
        fetcher.fetch("a//b.tar.gz", &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"right");
    }

    #[tokio::test]
    async fn signing_failure_sends_nothing() {
        let server = ObjectServer::start().await;
        server.put(BUCKET, "context.tar.gz", b"data".to_vec());

        let config = server.config().with_custom_host("bad\nhost");
        let fetcher = ObjectFetcher::connect(&config, BUCKET).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher
            .fetch("context.tar.gz", &dir.path().join("context.tar.gz"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ConnectionConfig::default()
            .with_endpoint(format!("http://{addr}"))
            .with_allow_http(true)
            .with_force_path_style(true)
            .with_credentials("id", "secret")
            .with_custom_host("storage.internal");
        let fetcher = ObjectFetcher::connect(&config, BUCKET).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher
            .fetch("context.tar.gz", &dir.path().join("context.tar.gz"))
            .await
            .unwrap_err();

        assert_eq!(err.transfer_kind(), Some(TransferErrorKind::Network));
    }

    #[tokio::test]
    async fn destination_under_a_file_is_local_io_error() {
        let server = ObjectServer::start().await;
        server.put(BUCKET, "context.tar.gz", b"data".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let fetcher = ObjectFetcher::connect(&server.config(), BUCKET).unwrap();
        let err = fetcher
            .fetch("context.tar.gz", &blocker.join("context.tar.gz"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LocalIo);
        assert_eq!(server.request_count(), 0);
    }
}
