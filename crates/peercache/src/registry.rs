//! Process-wide lookup of groups by name

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::group::{Getter, Group};
use crate::stats::StatsSnapshot;

/// Named groups served by this node
///
/// Created once at startup and shared with the transport, which resolves the
/// group segment of incoming peer requests against it.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group
    ///
    /// # Returns
    /// * `Err(Error::DuplicateGroup)` - if a group with the same name exists
    pub fn register(&self, group: Group) -> Result<Arc<Group>> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(Error::DuplicateGroup(group.name().to_string()));
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_string(), Arc::clone(&group));
        info!(group = group.name(), capacity = group.capacity(), "registered group");
        Ok(group)
    }

    /// Create and register a group in one step
    pub fn new_group<G>(&self, name: &str, cache_bytes: usize, getter: G) -> Result<Arc<Group>>
    where
        G: Getter + 'static,
    {
        self.register(Group::new(name, cache_bytes, getter))
    }

    /// Look up a group by name
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Names of all registered groups, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stats for every group, keyed by name
    pub fn stats(&self) -> BTreeMap<String, StatsSnapshot> {
        self.groups
            .read()
            .iter()
            .map(|(name, group)| (name.clone(), group.stats_snapshot()))
            .collect()
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if no groups are registered
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}
