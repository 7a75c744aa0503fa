//! Error types for peercache

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by loader callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for peercache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache lookups and peer coordination
///
/// Cloneable so that a single in-flight load can hand the same outcome to
/// every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Lookup with an empty key
    #[error("key is required")]
    EmptyKey,

    /// A group with this name is already registered
    #[error("duplicate registration of group {0}")]
    DuplicateGroup(String),

    /// `register_peers` called twice on the same group
    #[error("peers already registered for group {0}")]
    PeersAlreadyRegistered(String),

    /// The loader callback failed
    #[error(transparent)]
    Loader(Arc<dyn std::error::Error + Send + Sync>),

    /// The request to a peer could not be sent or its body could not be read
    #[error("request to peer {url} failed: {reason}")]
    PeerRequest {
        /// Full URL of the peer request
        url: String,
        /// Transport failure description
        reason: String,
    },

    /// The peer answered with a non-200 status
    #[error("peer {url} returned: {status}")]
    PeerStatus {
        /// Full URL of the peer request
        url: String,
        /// Status line reported by the peer
        status: String,
    },

    /// A wire message could not be decoded
    #[error("decoding response body: {0}")]
    Decode(String),
}

impl Error {
    /// Wrap a loader failure, keeping its message intact
    pub fn loader(err: BoxError) -> Self {
        Error::Loader(Arc::from(err))
    }

    /// True for failures that came from talking to a remote peer
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::PeerRequest { .. } | Error::PeerStatus { .. } | Error::Decode(_)
        )
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}
