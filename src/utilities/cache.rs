use std::hash::Hash;

use moka::sync::Cache;

/// Key-value store shared between concurrent renders.
///
/// Writes are idempotent, so a race between two renders only costs redundant work. Once full,
/// entries are evicted by moka's size-bounded policy.
pub struct BoundedCache<K, V> {
    entries: Option<Cache<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// a capacity of 0 disables caching
    pub fn new(capacity: usize) -> Self {
        let capacity = u64::try_from(capacity).unwrap_or(u64::MAX);
        let entries = (capacity > 0).then(|| Cache::new(capacity));
        Self { entries }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.as_ref()?.get(key)
    }

    pub fn insert(&self, key: K, value: V) {
        if let Some(entries) = &self.entries {
            entries.insert(key, value);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> u64 {
        self.entries.as_ref().map_or(0, |entries| {
            entries.run_pending_tasks();
            entries.entry_count()
        })
    }
}
