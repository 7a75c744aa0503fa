//! Peer pool: consistent-hash selection of the node owning a key

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use peercache::{HashFn, HashRing, PeerGetter, PeerPicker};
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::client::HttpGetter;

/// Path prefix for peer-to-peer requests
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

/// Upper bound on a single peer fetch
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Pool configuration
#[derive(Clone)]
pub struct PoolOptions {
    /// Path prefix peers are served under, e.g. `/_peercache/`
    pub base_path: String,
    /// Virtual nodes per peer on the ring
    pub replicas: usize,
    /// Ring hash; CRC-32 when `None`
    pub hash: Option<HashFn>,
    /// Timeout applied to every peer request
    pub timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            hash: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct PeerState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Set of peers reachable over HTTP, including this node
///
/// Must be created, updated and dropped outside async contexts: it owns a
/// blocking HTTP client.
pub struct HttpPool {
    /// This node's base URL, e.g. `http://10.0.0.1:8001`
    self_url: String,
    opts: PoolOptions,
    client: Client,
    state: RwLock<PeerState>,
}

impl HttpPool {
    /// Create a pool for the node reachable at `self_url`
    #[cfg(test)]
    pub fn new(self_url: &str) -> Result<Self> {
        Self::with_options(self_url, PoolOptions::default())
    }

    /// Create a pool with explicit options
    pub fn with_options(self_url: &str, opts: PoolOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .build()
            .context("building peer HTTP client")?;

        let ring = Self::new_ring(&opts);
        Ok(Self {
            self_url: normalize_url(self_url),
            opts,
            client,
            state: RwLock::new(PeerState {
                ring,
                getters: HashMap::new(),
            }),
        })
    }

    /// This node's base URL
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Path prefix for peer requests
    pub fn base_path(&self) -> &str {
        &self.opts.base_path
    }

    /// Replace the peer set
    ///
    /// Peers are base URLs such as `http://10.0.0.2:8001` and should include
    /// this node. The ring and clients are rebuilt off to the side and swapped
    /// in under the lock, so lookups never observe a partial update.
    pub fn set_peers<S: AsRef<str>>(&self, peers: &[S]) {
        let peers: Vec<String> = peers.iter().map(|p| normalize_url(p.as_ref())).collect();

        let mut ring = Self::new_ring(&self.opts);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(
                    format!("{}{}", peer, self.opts.base_path),
                    self.client.clone(),
                );
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.state.write() = PeerState { ring, getters };
        info!(server = %self.self_url, peers = ?peers, "peer set updated");
    }

    /// Node owning `key`, or `None` if no peers are set
    #[cfg(test)]
    pub fn owner(&self, key: &str) -> Option<String> {
        self.state.read().ring.get(key).map(str::to_string)
    }

    fn new_ring(opts: &PoolOptions) -> HashRing {
        match &opts.hash {
            Some(hash) => HashRing::with_hash(opts.replicas, Arc::clone(hash)),
            None => HashRing::new(opts.replicas),
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let peer = state.ring.get(key)?;
        if peer == self.self_url {
            return None;
        }

        let getter = state.getters.get(peer)?;
        debug!(server = %self.self_url, peer = getter.base_url(), key, "pick peer");
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

/// Strip trailing slashes so `http://host:port/` and `http://host:port` name
/// the same node
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
