//! Consistent-hash ring with virtual nodes
//!
//! Each physical node is placed on the ring `replicas` times, at the hashes of
//! `"<i><node>"` for `i` in `0..replicas`. A key belongs to the first virtual
//! node clockwise from the key's hash.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hash function mapping bytes onto the ring
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Ring mapping keys to node identifiers
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node hashes
    keys: Vec<u32>,
    hash_map: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring using CRC-32 (IEEE) as the hash
    pub fn new(replicas: usize) -> Self {
        Self::with_hash(replicas, Arc::new(crc32fast::hash))
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hash(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            keys: Vec::new(),
            hash_map: HashMap::new(),
        }
    }

    /// Place nodes on the ring
    pub fn add<S: AsRef<str>>(&mut self, nodes: &[S]) {
        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{i}{node}").as_bytes());
                if self.hash_map.insert(hash, node.to_string()).is_none() {
                    self.keys.push(hash);
                }
            }
        }
        self.keys.sort_unstable();
    }

    /// Node owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&k| k < hash);
        // Past the last virtual node wraps around to the first
        let virtual_key = self.keys[idx % self.keys.len()];
        self.hash_map.get(&virtual_key).map(String::as_str)
    }

    /// True if no nodes have been added
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hash that reads the input as a decimal number, so ring positions are
    /// predictable
    fn decimal_hash() -> HashFn {
        Arc::new(|data: &[u8]| {
            std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0)
        })
    }

    #[test]
    fn test_ring_lookup() {
        let mut ring = HashRing::with_hash(3, decimal_hash());

        // Virtual nodes: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(&["6", "4", "2"]);
        assert_eq!(ring.len(), 9);

        for (key, node) in [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")] {
            assert_eq!(ring.get(key), Some(node), "asking for {key}");
        }

        // Adds 8, 18, 28
        ring.add(&["8"]);

        // 27 should now map to 8
        for (key, node) in [("2", "2"), ("11", "2"), ("23", "4"), ("27", "8")] {
            assert_eq!(ring.get(key), Some(node), "asking for {key}");
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(50);
        assert!(ring.is_empty());
        assert_eq!(ring.get("Tom"), None);
    }

    #[test]
    fn test_ring_is_deterministic() {
        let nodes = ["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"];
        let mut a = HashRing::new(50);
        let mut b = HashRing::new(50);
        a.add(&nodes);
        b.add(&nodes);

        for i in 0..1000 {
            let key = format!("key-{i}");
            let owner = a.get(&key);
            assert!(owner.is_some());
            assert_eq!(owner, a.get(&key));
            assert_eq!(owner, b.get(&key));
        }
    }

    #[test]
    fn test_adding_node_moves_few_keys() {
        let mut ring = HashRing::new(50);
        ring.add(&["node-a", "node-b", "node-c", "node-d"]);

        let keys: Vec<String> = (0..10_000).map(|i| format!("user:{i}")).collect();
        let before: Vec<String> = keys
            .iter()
            .map(|k| ring.get(k).unwrap_or_default().to_string())
            .collect();

        ring.add(&["node-e"]);

        let mut moved = 0;
        for (key, old) in keys.iter().zip(&before) {
            let new = ring.get(key).unwrap_or_default();
            if new != old.as_str() {
                // Keys only ever move onto the new node
                assert_eq!(new, "node-e");
                moved += 1;
            }
        }

        // Ideal share is 1/5; modulo hashing would move ~4/5
        assert!(moved > 0);
        assert!(moved < keys.len() * 2 / 5, "moved {moved} of {}", keys.len());
    }
}
