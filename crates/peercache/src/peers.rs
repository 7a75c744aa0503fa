//! Peer capabilities used by cache groups
//!
//! ```text
//!   pick owner by consistent hash      yes                           yes
//!   |-----> remote peer? -----> fetch from peer client --> ok? -----> return value
//!   |  no                                    |  no
//!   |----------------------------> load locally with the group's getter
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::pb;

/// Resolves which peer owns a key
pub trait PeerPicker: Send + Sync {
    /// Client for the owning peer, or `None` when the key should be handled
    /// locally (this node owns it, or no peers are configured)
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches values from one remote peer
pub trait PeerGetter: Send + Sync {
    /// Look up `req.key` in group `req.group` on the peer
    fn get(&self, req: &pb::Request) -> Result<pb::Response>;
}

/// Picker that never selects a remote peer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}
