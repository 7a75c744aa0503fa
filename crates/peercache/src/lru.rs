//! LRU (Least Recently Used) cache bounded by byte size
//!
//! Uses a slab-backed doubly-linked list for O(1) promotion and eviction.
//! Not synchronized: callers that share a cache across threads must guard it
//! with a lock held across each read-modify-write.

use std::collections::HashMap;

use ahash::RandomState;

/// Size in bytes a value contributes to the cache budget
pub trait ByteLen {
    /// Number of bytes the value occupies
    fn byte_len(&self) -> usize;
}

impl ByteLen for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteLen for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with each entry removed by eviction or [`LruCache::clear`]
///
/// Runs synchronously while the cache is mutably borrowed. It must not call
/// back into the cache that invoked it; when the cache sits behind a lock,
/// doing so deadlocks.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the LRU doubly-linked list
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU cache holding at most `max_bytes` of keys plus values
///
/// A `max_bytes` of zero disables the bound.
pub struct LruCache<V> {
    map: HashMap<String, usize, RandomState>,
    nodes: Vec<Option<Node<V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    max_bytes: usize,
    used_bytes: usize,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteLen> LruCache<V> {
    /// Create a new LRU cache bounded to `max_bytes` (0 = unbounded)
    pub fn new(max_bytes: usize) -> Self {
        Self {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            head: None,
            tail: None,
            free_list: Vec::new(),
            max_bytes,
            used_bytes: 0,
            on_evicted: None,
        }
    }

    /// Create a cache that reports every evicted entry to `on_evicted`
    pub fn with_eviction_callback<F>(max_bytes: usize, on_evicted: F) -> Self
    where
        F: FnMut(&str, &V) + Send + 'static,
    {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(Box::new(on_evicted));
        cache
    }

    /// Look up a key, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace a value, then evict until back under budget
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.map.get(&key) {
            // Update existing
            if let Some(node) = &mut self.nodes[idx] {
                self.used_bytes = self.used_bytes - node.value.byte_len() + value.byte_len();
                node.value = value;
            }
            self.move_to_front(idx);
        } else {
            self.used_bytes += key.len() + value.byte_len();

            let idx = self.alloc_node();
            self.nodes[idx] = Some(Node {
                key: key.clone(),
                value,
                prev: None,
                next: self.head,
            });

            if let Some(head_idx) = self.head {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }

            self.head = Some(idx);
            if self.tail.is_none() {
                self.tail = Some(idx);
            }

            self.map.insert(key, idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if !self.remove_oldest_entry() {
                break;
            }
        }
    }

    /// Evict the least recently used entry, if any
    pub fn remove_oldest(&mut self) {
        self.remove_oldest_entry();
    }

    /// Remove a key without invoking the eviction callback
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.free_node(idx);
        self.used_bytes -= node.key.len() + node.value.byte_len();
        Some(node.value)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes currently accounted to keys and values
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Drop every entry, reporting each one to the eviction callback
    pub fn clear(&mut self) {
        if let Some(on_evicted) = self.on_evicted.as_mut() {
            for node in self.nodes.iter().flatten() {
                on_evicted(&node.key, &node.value);
            }
        }
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        self.used_bytes = 0;
    }

    fn remove_oldest_entry(&mut self) -> bool {
        let Some(tail_idx) = self.tail else {
            return false;
        };

        self.unlink(tail_idx);
        let Some(node) = self.nodes[tail_idx].take() else {
            return false;
        };
        self.free_node(tail_idx);
        self.map.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.byte_len();

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(&node.key, &node.value);
        }
        true
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = if let Some(node) = &self.nodes[idx] {
            (node.prev, node.next)
        } else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_lru_get() {
        let mut cache = LruCache::new(0);

        cache.add("key1", s("1234"));

        assert_eq!(cache.get("key1"), Some(&s("1234")));
        assert_eq!(cache.get("key2"), None);
        assert_eq!(cache.used_bytes(), "key1".len() + "1234".len());
    }

    #[test]
    fn test_lru_remove_oldest() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let (v1, v2, v3) = ("value1", "value2", "v3");
        let cap = k1.len() + k2.len() + v1.len() + v2.len();
        let mut cache = LruCache::new(cap);

        cache.add(k1, s(v1));
        cache.add(k2, s(v2));
        cache.add(k3, s(v3)); // Should evict key1

        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_recency() {
        // Room for exactly two entries
        let mut cache = LruCache::new(4);

        cache.add("a", s("1"));
        cache.add("b", s("2"));
        cache.get("a"); // Move a to front
        cache.add("c", s("3")); // Should evict b

        assert_eq!(cache.get("a"), Some(&s("1")));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(&s("3")));
    }

    #[test]
    fn test_lru_on_evicted() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut cache = LruCache::with_eviction_callback(10, move |key: &str, _: &String| {
            sink.lock().push(key.to_string());
        });

        cache.add("key1", s("123456"));
        cache.add("k2", s("k2"));
        cache.add("k3", s("k3"));
        cache.add("k4", s("k4"));

        assert_eq!(*evicted.lock(), vec![s("key1"), s("k2")]);
    }

    #[test]
    fn test_lru_overwrite_adjusts_bytes() {
        let mut cache = LruCache::new(0);

        cache.add("k", s("a"));
        cache.add("k", s("abcd")); // Overwrite

        assert_eq!(cache.get("k"), Some(&s("abcd")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 5);
    }

    #[test]
    fn test_lru_oversized_value_passes_through() {
        let mut cache = LruCache::new(8);

        cache.add("small", s("x"));
        cache.add("huge", s("0123456789"));

        assert_eq!(cache.get("huge"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_lru_remove_and_clear() {
        let evictions = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&evictions);
        let mut cache = LruCache::with_eviction_callback(0, move |_: &str, _: &String| {
            *counter.lock() += 1;
        });

        cache.add("a", s("1"));
        cache.add("b", s("2"));
        cache.add("c", s("3"));

        assert_eq!(cache.remove("b"), Some(s("2")));
        assert_eq!(cache.used_bytes(), 4);
        assert_eq!(*evictions.lock(), 0);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
        assert_eq!(*evictions.lock(), 2);
    }

    #[test]
    fn test_lru_remove_oldest_on_empty() {
        let mut cache: LruCache<String> = LruCache::new(16);
        cache.remove_oldest();
        assert_eq!(cache.len(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, usize),
        Get(u8),
        RemoveOldest,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, 0usize..24).prop_map(|(k, n)| Op::Add(k, n)),
            (0u8..16).prop_map(Op::Get),
            Just(Op::RemoveOldest),
        ]
    }

    proptest! {
        #[test]
        fn prop_byte_accounting(cap in 0usize..96, ops in prop::collection::vec(op_strategy(), 1..200)) {
            let mut cache = LruCache::new(cap);
            let mut present: std::collections::HashMap<String, usize> = Default::default();
            let evicted = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&evicted);
            cache.on_evicted = Some(Box::new(move |k: &str, _: &String| sink.lock().push(k.to_string())));

            for op in ops {
                match op {
                    Op::Add(k, n) => {
                        let key = format!("key{k}");
                        present.insert(key.clone(), n);
                        cache.add(key, "v".repeat(n));
                        if cap != 0 {
                            prop_assert!(cache.used_bytes() <= cap);
                        }
                    }
                    Op::Get(k) => {
                        let key = format!("key{k}");
                        let hit = cache.get(&key).map(|v| v.len());
                        prop_assert_eq!(hit, present.get(&key).copied());
                    }
                    Op::RemoveOldest => cache.remove_oldest(),
                }
                for key in evicted.lock().drain(..) {
                    present.remove(&key);
                }

                let expected: usize = present.iter().map(|(k, n)| k.len() + n).sum();
                prop_assert_eq!(cache.used_bytes(), expected);
                prop_assert_eq!(cache.len(), present.len());
            }
        }
    }
}
