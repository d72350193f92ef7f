//! Bounded preload cache with least-recently-inserted eviction.
//!
//! Entries keep their insertion position for their whole life: writing a new
//! resource URL for a link that is already cached replaces the value in
//! place and never moves it to the back of the queue.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered map from item link to resolved resource URL.
///
/// Serialized as a JSON object whose key order is the insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreloadCache {
    entries: IndexMap<String, String>,
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resource URL cached for `link`, if any.
    pub fn get(&self, link: &str) -> Option<&str> {
        self.entries.get(link).map(String::as_str)
    }

    pub fn contains(&self, link: &str) -> bool {
        self.entries.contains_key(link)
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Record a preloaded resource, evicting the oldest entries beyond `capacity`.
    ///
    /// Returns the links that were evicted, oldest first. A link that is
    /// already present keeps its position and only has its value replaced.
    pub fn record(&mut self, link: impl Into<String>, resource_url: impl Into<String>, capacity: usize) -> Vec<String> {
        // IndexMap::insert keeps the slot of an existing key
        let (_, previous) = self.entries.insert_full(link.into(), resource_url.into());
        if previous.is_some() {
            return Vec::new();
        }

        let excess = self.entries.len().saturating_sub(capacity);
        self.entries.drain(..excess).map(|(oldest, _)| oldest).collect()
    }

    /// Insert without a bound; used when rebuilding from storage.
    pub(crate) fn push_loaded(&mut self, link: String, resource_url: String) {
        self.entries.insert(link, resource_url);
    }
}
