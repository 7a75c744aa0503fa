//! # peercache
//!
//! Distributed read-through cache. Each node keeps a byte-bounded LRU per
//! group and asks the peer that owns a key before falling back to the
//! group's loader.
//!
//! ## Architecture
//! - **LRU**: slab-backed doubly-linked list + AHash index, bounded by bytes
//! - **Consistent hashing**: virtual-node ring picking the owner of each key
//! - **Single flight**: concurrent misses for one key share a single load
//! - **Group**: ties the loader, the local store and the peer picker together
//!
//! ## Lookup flow
//! 1. Local store hit: done
//! 2. Miss: enter the single flight for the key
//! 3. Owner is a remote peer: fetch from it, falling back to the loader on error
//! 4. Otherwise: run the loader and store the result locally

#![warn(missing_docs)]

mod byteview;
mod consistenthash;
mod error;
mod group;
mod lru;
pub mod pb;
mod peers;
mod registry;
mod singleflight;
mod stats;

pub use byteview::ByteView;
pub use consistenthash::{HashFn, HashRing};
pub use error::{BoxError, Error, Result};
pub use group::{Getter, Group};
pub use lru::{ByteLen, EvictionCallback, LruCache};
pub use peers::{NoPeers, PeerGetter, PeerPicker};
pub use registry::GroupRegistry;
pub use singleflight::SingleFlight;
pub use stats::{GroupStats, StatsSnapshot};
