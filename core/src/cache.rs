//! Keyed in-memory caches
//!
//! The client keeps four of these: executors, services, supported operations
//! and instance IDs. Mutation is crate-private; a bootstrap pass fills
//! fresh tables and swaps them in whole.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Cache<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> Cache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    /// Swap the whole table for `entries`
    pub(crate) fn replace_all(&mut self, entries: HashMap<String, V>) {
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_all_drops_stale_entries() {
        let mut cache = Cache::new();
        cache.insert("ebs", 1);
        cache.insert("efs", 2);

        let mut fresh = HashMap::new();
        fresh.insert("vfs".to_string(), 3);
        cache.replace_all(fresh);

        assert!(!cache.contains("ebs"));
        assert_eq!(cache.get("vfs"), Some(&3));
        assert_eq!(cache.keys(), vec!["vfs".to_string()]);
    }
}
