//! In-process S3 test double.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;

pub(crate) const ACCESS_KEY: &str = "test-access-key";
pub(crate) const SECRET_KEY: &str = "test-secret-key";

#[derive(Default)]
struct Shared {
    objects: Mutex<HashMap<String, Bytes>>,
    forbidden: Mutex<HashSet<String>>,
    hosts: Mutex<Vec<String>>,
    authorizations: Mutex<Vec<String>>,
    requests: AtomicUsize,
}

/// Path-style S3 endpoint serving objects from memory and recording requests.
pub(crate) struct ObjectServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl ObjectServer {
    pub(crate) async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());

        let app = Router::new().fallback(serve_object).with_state(shared.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, shared, task }
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connection settings for plain-HTTP, path-style access to this server.
    pub(crate) fn config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_endpoint(self.endpoint())
            .with_credentials(ACCESS_KEY, SECRET_KEY)
            .with_force_path_style(true)
            .with_allow_http(true)
    }

    pub(crate) fn put(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.shared
            .objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), data.into());
    }

    pub(crate) fn forbid(&self, bucket: &str, key: &str) {
        self.shared
            .forbidden
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"));
    }

    pub(crate) fn request_count(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn hosts(&self) -> Vec<String> {
        self.shared.hosts.lock().unwrap().clone()
    }

    pub(crate) fn authorizations(&self) -> Vec<String> {
        self.shared.authorizations.lock().unwrap().clone()
    }
}

impl Drop for ObjectServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_object(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    shared.requests.fetch_add(1, Ordering::SeqCst);
    let header_value = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    shared.hosts.lock().unwrap().push(header_value(header::HOST));
    shared
        .authorizations
        .lock()
        .unwrap()
        .push(header_value(header::AUTHORIZATION));

    let path = uri.path().trim_start_matches('/').to_owned();
    if shared.forbidden.lock().unwrap().contains(&path) {
        return error_response(StatusCode::FORBIDDEN, "AccessDenied");
    }
    let Some(data) = shared.objects.lock().unwrap().get(&path).cloned() else {
        return error_response(StatusCode::NOT_FOUND, "NoSuchKey");
    };

    let total = data.len() as u64;
    let base = [
        (header::ETAG, "\"0123456789abcdef\"".to_owned()),
        (header::LAST_MODIFIED, "Tue, 15 Nov 1994 08:12:31 GMT".to_owned()),
        (header::CONTENT_TYPE, "application/octet-stream".to_owned()),
    ];

    if method == Method::HEAD {
        let mut response = (StatusCode::OK, base).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(total));
        return response;
    }

    match parse_range(&header_value(header::RANGE), total) {
        None => (StatusCode::OK, base, Body::from(data)).into_response(),
        Some(Ok((start, end))) => {
            let content_range = format!("bytes {start}-{end}/{total}");
            let slice = data.slice(start as usize..=end as usize);
            let mut response = (StatusCode::PARTIAL_CONTENT, base, Body::from(slice)).into_response();
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&content_range).unwrap(),
            );
            response
        }
        Some(Err(())) => error_response(StatusCode::RANGE_NOT_SATISFIABLE, "InvalidRange"),
    }
}

/// Parses `bytes=start-end` / `bytes=start-`, clamping the end to the object.
fn parse_range(value: &str, total: u64) -> Option<Result<(u64, u64), ()>> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    if start >= total {
        return Some(Err(()));
    }
    let end = match end {
        "" => total - 1,
        end => end.parse::<u64>().ok()?.min(total - 1),
    };
    Some(Ok((start, end)))
}

fn error_response(status: StatusCode, code: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Error><Code>{code}</Code><Message>{code}</Message><RequestId>test</RequestId></Error>"
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Builds a gzip-compressed tarball from `(path, contents)` pairs.
pub(crate) fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    let tarball = builder.into_inner().unwrap();

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tarball).unwrap();
    encoder.finish().unwrap()
}
