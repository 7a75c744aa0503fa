//! Group statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one cache group
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
    evictions: AtomicU64,
    server_requests: AtomicU64,
}

/// Point-in-time copy of a group's counters and store usage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups requested
    pub gets: u64,
    /// Lookups served from the local store
    pub cache_hits: u64,
    /// Values fetched from peers
    pub peer_loads: u64,
    /// Failed peer fetches
    pub peer_errors: u64,
    /// Lookups that missed the local store and went to a peer or the loader
    pub loads: u64,
    /// Misses that shared an in-flight load
    pub loads_deduped: u64,
    /// Successful loader calls
    pub local_loads: u64,
    /// Failed loader calls
    pub local_load_errs: u64,
    /// Entries evicted from the local store
    pub evictions: u64,
    /// Requests served to peers
    pub server_requests: u64,
    /// `cache_hits / gets`
    pub hit_ratio: f64,
    /// Bytes held by the local store
    pub cache_bytes: usize,
    /// Entries held by the local store
    pub cache_items: usize,
}

impl GroupStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `get` call
    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a local store hit
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value fetched from a peer
    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed peer fetch
    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a load (cache miss), `deduped` if it waited on another caller
    pub fn record_load(&self, deduped: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if deduped {
            self.loads_deduped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a successful local loader call
    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed local loader call
    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request served to a peer
    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total gets
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Get total local store hits
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Get total peer loads
    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    /// Get total peer errors
    pub fn peer_errors(&self) -> u64 {
        self.peer_errors.load(Ordering::Relaxed)
    }

    /// Get total loads
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Get total loads that shared another caller's result
    pub fn loads_deduped(&self) -> u64 {
        self.loads_deduped.load(Ordering::Relaxed)
    }

    /// Get total successful local loads
    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    /// Get total failed local loads
    pub fn local_load_errs(&self) -> u64 {
        self.local_load_errs.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total requests served to peers
    pub fn server_requests(&self) -> u64 {
        self.server_requests.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets();
        if gets == 0 {
            0.0
        } else {
            self.cache_hits() as f64 / gets as f64
        }
    }

    /// Copy the counters, adding the store's current usage
    pub fn snapshot(&self, cache_bytes: usize, cache_items: usize) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets(),
            cache_hits: self.cache_hits(),
            peer_loads: self.peer_loads(),
            peer_errors: self.peer_errors(),
            loads: self.loads(),
            loads_deduped: self.loads_deduped(),
            local_loads: self.local_loads(),
            local_load_errs: self.local_load_errs(),
            evictions: self.evictions(),
            server_requests: self.server_requests(),
            hit_ratio: self.hit_ratio(),
            cache_bytes,
            cache_items,
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in [
            &self.gets,
            &self.cache_hits,
            &self.peer_loads,
            &self.peer_errors,
            &self.loads,
            &self.loads_deduped,
            &self.local_loads,
            &self.local_load_errs,
            &self.evictions,
            &self.server_requests,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
