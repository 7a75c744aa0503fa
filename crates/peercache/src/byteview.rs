//! Immutable view over cached bytes

use std::fmt;

use bytes::Bytes;

use crate::lru::ByteLen;

/// Immutable byte buffer held by the cache
///
/// Clones share the underlying buffer; there is no way to mutate it once
/// constructed. [`ByteView::byte_slice`] hands out a fresh copy so callers can
/// never alias cached state.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Number of bytes in the view
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// True if the view holds no bytes
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Copy of the bytes
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Decode the bytes as UTF-8, replacing invalid sequences
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.b).into_owned()
    }
}

impl ByteLen for ByteView {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(b: Vec<u8>) -> Self {
        Self { b: Bytes::from(b) }
    }
}

impl From<&[u8]> for ByteView {
    fn from(b: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(b),
        }
    }
}

impl From<String> for ByteView {
    fn from(s: String) -> Self {
        Self::from(s.into_bytes())
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::from(s.as_bytes())
    }
}

impl PartialEq<[u8]> for ByteView {
    fn eq(&self, other: &[u8]) -> bool {
        self.b.as_ref() == other
    }
}

impl PartialEq<&str> for ByteView {
    fn eq(&self, other: &&str) -> bool {
        self.b.as_ref() == other.as_bytes()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("len", &self.len()).finish()
    }
}
