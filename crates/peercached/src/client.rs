//! HTTP client side of the peer protocol

use peercache::{pb, Error, PeerGetter, Result};
use prost::Message;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::debug;

/// Fetches values from one remote peer
///
/// `base_url` is the peer's address joined with the pool's base path, e.g.
/// `http://10.0.0.2:8001/_peercache/`.
pub struct HttpGetter {
    base_url: String,
    client: Client,
}

impl HttpGetter {
    /// Create a getter sharing the pool's connection pool
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// URL prefix requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, req: &pb::Request) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(&req.group),
            urlencoding::encode(&req.key)
        )
    }
}

impl PeerGetter for HttpGetter {
    fn get(&self, req: &pb::Request) -> Result<pb::Response> {
        let url = self.url_for(req);
        debug!(%url, "fetching from peer");

        let res = self.client.get(&url).send().map_err(|e| Error::PeerRequest {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        if res.status() != StatusCode::OK {
            return Err(Error::PeerStatus {
                url,
                status: res.status().to_string(),
            });
        }

        let body = res.bytes().map_err(|e| Error::PeerRequest {
            url: url.clone(),
            reason: format!("reading response body: {e}"),
        })?;

        Ok(pb::Response::decode(body)?)
    }
}
