//! Front-end API for clients of the cache: `GET /api?key=<key>`

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use peercache::Group;
use tokio::net::TcpListener;
use tracing::info;

use crate::server::{accept_loop, bytes_response, text_response};

/// Answers user lookups against a single group
pub struct ApiServer {
    group: Arc<Group>,
}

impl ApiServer {
    /// Create an API server for `group`
    pub fn new(group: Arc<Group>) -> Self {
        Self { group }
    }

    /// Handle one HTTP request
    pub async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        self.route(req.uri().path(), req.uri().query()).await
    }

    async fn route(&self, path: &str, query: Option<&str>) -> Response<Full<Bytes>> {
        if path != "/api" {
            return text_response(StatusCode::NOT_FOUND, "not found");
        }
        let Some(key) = query.and_then(key_param) else {
            return text_response(StatusCode::BAD_REQUEST, "key is required");
        };

        let group = Arc::clone(&self.group);
        match tokio::task::spawn_blocking(move || group.get(&key)).await {
            Ok(Ok(view)) => bytes_response(StatusCode::OK, "application/octet-stream", view.byte_slice()),
            Ok(Err(err)) => text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Err(join_err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string()),
        }
    }
}

/// Decoded value of the `key` query parameter
fn key_param(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("key="))
        .and_then(|raw| {
            urlencoding::decode(&raw.replace('+', " "))
                .ok()
                .map(|key| key.into_owned())
        })
        .filter(|key| !key.is_empty())
}

/// Serve the front-end API on `listener`
pub async fn serve_api(listener: TcpListener, server: Arc<ApiServer>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(group = server.group.name(), %addr, "api server listening");
    }

    accept_loop(listener, "api", move |req| {
        let server = Arc::clone(&server);
        async move { server.handle(req).await }
    })
    .await
}
