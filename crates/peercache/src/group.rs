//! Group: a named read-through cache over a loader callback

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::byteview::ByteView;
use crate::error::{BoxError, Error, Result};
use crate::lru::LruCache;
use crate::pb;
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight::SingleFlight;
use crate::stats::{GroupStats, StatsSnapshot};

/// Loads the value for a key when no cache holds it
pub trait Getter: Send + Sync {
    /// Produce the bytes for `key`
    fn get(&self, key: &str) -> std::result::Result<Vec<u8>, BoxError>;
}

impl<F> Getter for F
where
    F: Fn(&str) -> std::result::Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn get(&self, key: &str) -> std::result::Result<Vec<u8>, BoxError> {
        self(key)
    }
}

/// Cache namespace combining a loader, a byte-bounded local store and an
/// optional peer picker
pub struct Group {
    name: String,

    /// Source of truth on a miss
    getter: Box<dyn Getter>,

    /// Values this node owns or loaded itself
    main_cache: Mutex<LruCache<ByteView>>,

    /// Set at most once via `register_peers`
    peers: OnceLock<Arc<dyn PeerPicker>>,

    /// Collapses concurrent misses for the same key
    loader: SingleFlight<Result<ByteView>>,

    stats: Arc<GroupStats>,
}

impl Group {
    /// Create a group
    ///
    /// # Arguments
    /// * `name` - Group name, used by peers to address it
    /// * `cache_bytes` - Local store budget in bytes (0 = unbounded)
    /// * `getter` - Loader invoked when neither this node nor a peer has the value
    pub fn new<G>(name: impl Into<String>, cache_bytes: usize, getter: G) -> Self
    where
        G: Getter + 'static,
    {
        let stats = Arc::new(GroupStats::new());
        let eviction_stats = Arc::clone(&stats);

        Self {
            name: name.into(),
            getter: Box::new(getter),
            main_cache: Mutex::new(LruCache::with_eviction_callback(
                cache_bytes,
                move |_: &str, _: &ByteView| eviction_stats.record_eviction(),
            )),
            peers: OnceLock::new(),
            loader: SingleFlight::new(),
            stats,
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the peer picker used to locate remote owners
    ///
    /// # Returns
    /// * `Err(Error::PeersAlreadyRegistered)` - if a picker is already installed
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::PeersAlreadyRegistered(self.name.clone()))
    }

    /// Get the value for `key`, from the local store, its owning peer, or the
    /// loader
    pub fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        self.stats.record_get();
        if let Some(value) = self.lookup_cache(key) {
            self.stats.record_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key)
    }

    fn load(&self, key: &str) -> Result<ByteView> {
        let mut rechecked_hit = false;
        let (result, deduped) = self.loader.execute_shared(key, || {
            // An earlier flight may have filled the store after our miss
            if let Some(value) = self.lookup_cache(key) {
                rechecked_hit = true;
                return Ok(value);
            }

            if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(key)) {
                match self.get_from_peer(peer.as_ref(), key) {
                    Ok(value) => {
                        self.stats.record_peer_load();
                        return Ok(value);
                    }
                    Err(err) => {
                        self.stats.record_peer_error();
                        warn!(
                            group = %self.name,
                            key,
                            error = %err,
                            remote = err.is_remote(),
                            "failed to get from peer, loading locally"
                        );
                    }
                }
            }

            self.get_locally(key)
        });

        if rechecked_hit {
            self.stats.record_hit();
        } else {
            self.stats.record_load(deduped);
        }
        result
    }

    fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let req = pb::Request {
            group: self.name.clone(),
            key: key.to_string(),
        };
        let resp = peer.get(&req)?;
        Ok(ByteView::from(resp.value))
    }

    fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.getter.get(key) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.stats.record_local_load_err();
                return Err(Error::loader(err));
            }
        };
        self.stats.record_local_load();

        let value = ByteView::from(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        self.main_cache.lock().get(key).cloned()
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.lock().add(key, value);
    }

    /// Group statistics
    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    /// Counters plus current store usage
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let cache = self.main_cache.lock();
        self.stats.snapshot(cache.used_bytes(), cache.len())
    }

    /// Number of entries in the local store
    pub fn cache_len(&self) -> usize {
        self.main_cache.lock().len()
    }

    /// Bytes held by the local store
    pub fn cache_bytes(&self) -> usize {
        self.main_cache.lock().used_bytes()
    }

    /// Local store budget in bytes (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.main_cache.lock().max_bytes()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .finish()
    }
}
