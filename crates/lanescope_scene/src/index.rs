//! # Group Index
//!
//! Maps each group key to the ids last written under it, plus the reverse
//! mapping so an id moving between groups is never listed twice.

use std::collections::{HashMap, HashSet};

use crate::flatten::GroupKey;

/// Bidirectional group ↔ id index.
#[derive(Debug, Default)]
pub struct GroupIndex {
    buckets: HashMap<GroupKey, HashSet<String>>,
    owners: HashMap<String, GroupKey>,
}

impl GroupIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` under `key`, unlisting it from any previous group.
    pub fn insert(&mut self, key: &GroupKey, id: &str) {
        if let Some(previous) = self.owners.get(id) {
            if previous == key {
                return;
            }
            let previous = previous.clone();
            self.unlist(&previous, id);
        }
        self.buckets.entry(key.clone()).or_default().insert(id.to_owned());
        self.owners.insert(id.to_owned(), key.clone());
    }

    /// Removes `id` from whichever group lists it.
    pub fn remove(&mut self, id: &str) -> Option<GroupKey> {
        let key = self.owners.remove(id)?;
        self.unlist(&key, id);
        Some(key)
    }

    /// Empties a bucket and returns the ids it listed.
    pub fn take_bucket(&mut self, key: &GroupKey) -> HashSet<String> {
        let ids = self.buckets.remove(key).unwrap_or_default();
        for id in &ids {
            self.owners.remove(id);
        }
        ids
    }

    /// Group currently listing `id`.
    #[must_use]
    pub fn group_of(&self, id: &str) -> Option<&GroupKey> {
        self.owners.get(id)
    }

    /// Ids listed under `key`.
    #[must_use]
    pub fn bucket(&self, key: &GroupKey) -> Option<&HashSet<String>> {
        self.buckets.get(key)
    }

    /// Iterates over every non-empty bucket.
    pub fn buckets(&self) -> impl Iterator<Item = (&GroupKey, &HashSet<String>)> {
        self.buckets.iter()
    }

    /// Number of groups with at least one id.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of indexed ids.
    #[must_use]
    pub fn id_count(&self) -> usize {
        self.owners.len()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.owners.clear();
    }

    fn unlist(&mut self, key: &GroupKey, id: &str) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.buckets.remove(key);
            }
        }
    }
}
