//! HTTP server side of the peer protocol
//!
//! Routes:
//! - `GET {base_path}{group}/{key}`: protobuf-encoded value of `key` in `group`
//! - `GET /stats`: JSON counters for every registered group
//! - `GET /healthz`: liveness probe

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use peercache::{pb, Error, GroupRegistry};
use prost::Message;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serves this node's groups to its peers
pub struct PeerServer {
    self_url: String,
    base_path: String,
    registry: Arc<GroupRegistry>,
}

impl PeerServer {
    /// Create a server for the groups in `registry`
    pub fn new(self_url: &str, base_path: &str, registry: Arc<GroupRegistry>) -> Self {
        Self {
            self_url: self_url.to_string(),
            base_path: base_path.to_string(),
            registry,
        }
    }

    /// Handle one HTTP request
    pub async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        self.route(req.method(), req.uri().path()).await
    }

    /// Dispatch on method and raw (still percent-encoded) path
    pub async fn route(&self, method: &Method, path: &str) -> Response<Full<Bytes>> {
        match path {
            "/healthz" => text_response(StatusCode::OK, "ok"),
            "/stats" => self.stats(),
            _ => match path.strip_prefix(self.base_path.as_str()) {
                Some(rest) => self.serve_group(method, path, rest).await,
                None => text_response(
                    StatusCode::NOT_FOUND,
                    format!("unexpected path: {path}"),
                ),
            },
        }
    }

    async fn serve_group(&self, method: &Method, path: &str, rest: &str) -> Response<Full<Bytes>> {
        info!(server = %self.self_url, %method, path, "peer request");

        if method != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        // <group>/<key>
        let Some((group_name, key)) = parse_group_key(rest) else {
            return text_response(StatusCode::BAD_REQUEST, "bad request");
        };

        let Some(group) = self.registry.get(&group_name) else {
            return text_response(
                StatusCode::NOT_FOUND,
                format!("no such group: {group_name}"),
            );
        };
        group.stats().record_server_request();

        // Lookups may block on the loader, a peer fetch or another caller's load
        let result = tokio::task::spawn_blocking(move || group.get(&key)).await;

        match result {
            Ok(Ok(view)) => {
                let body = pb::Response {
                    value: view.byte_slice(),
                }
                .encode_to_vec();
                bytes_response(StatusCode::OK, "application/octet-stream", body)
            }
            Ok(Err(err)) => text_response(status_for(&err), err.to_string()),
            Err(join_err) => {
                error!(server = %self.self_url, error = %join_err, "lookup task failed");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string())
            }
        }
    }

    fn stats(&self) -> Response<Full<Bytes>> {
        match serde_json::to_vec(&self.registry.stats()) {
            Ok(body) => bytes_response(StatusCode::OK, "application/json", body),
            Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

/// Split `<group>/<key>` and percent-decode both segments
fn parse_group_key(rest: &str) -> Option<(String, String)> {
    let (group, key) = rest.split_once('/')?;
    let group = urlencoding::decode(group).ok()?;
    let key = urlencoding::decode(key).ok()?;
    Some((group.into_owned(), key.into_owned()))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::EmptyKey => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Plain-text response
pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    bytes_response(status, "text/plain; charset=utf-8", body.into())
}

/// Response with an explicit content type
pub(crate) fn bytes_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

/// Accept connections forever, answering each request with `handler`
pub(crate) async fn accept_loop<F, Fut>(listener: TcpListener, name: &'static str, handler: F) -> Result<()>
where
    F: Fn(Request<Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let io = TokioIo::new(stream);
                let handler = handler.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let fut = handler(req);
                        async move { Ok::<_, Infallible>(fut.await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!("{} connection error from {}: {}", name, addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting {} connection: {}", name, e);
            }
        }
    }
}

/// Serve peer requests on `listener`
pub async fn serve_peers(listener: TcpListener, server: Arc<PeerServer>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(server = %server.self_url, %addr, "peer server listening");
    }

    accept_loop(listener, "peer", move |req| {
        let server = Arc::clone(&server);
        async move { server.handle(req).await }
    })
    .await
}
