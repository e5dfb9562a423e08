//! TTL-bounded label cache
//!
//! The metadata source is much slower and more rate-limited than the billing
//! source, so labels are fetched ahead of time by a [`LabelPopulator`] and
//! read from here during collection. Entries are replaced atomically per key;
//! a reader sees either the old or the new label set, never a partial one.

mod populate;

pub use populate::{LabelPopulator, PopulationHandle, PopulationReport};

use crate::error::CacheMiss;
use crate::models::{Labels, ResourceKind};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default entry lifetime (60 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime used when `now + ttl` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelKey {
    pub cluster: String,
    pub kind: ResourceKind,
    pub namespace: String,
    pub identifier: String,
}

impl LabelKey {
    pub fn new(
        cluster: impl Into<String>,
        kind: ResourceKind,
        namespace: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            kind,
            namespace: namespace.into(),
            identifier: identifier.into(),
        }
    }

    /// Key of a namespace's own labels
    pub fn namespace(cluster: impl Into<String>, namespace: &str) -> Self {
        Self::new(cluster, ResourceKind::Namespace, namespace, namespace)
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cluster={} kind={} namespace={} identifier={}",
            self.cluster, self.kind, self.namespace, self.identifier
        )
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    labels: Arc<Labels>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory label cache, cold-starts empty
#[derive(Debug)]
pub struct LabelCache {
    entries: DashMap<LabelKey, CacheEntry>,
    ttl: Duration,
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl LabelCache {
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store labels under `key`, replacing any previous entry
    pub fn insert(&self, key: LabelKey, labels: Labels) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(self.ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let entry = CacheEntry {
            labels: Arc::new(labels),
            expires_at,
        };
        self.entries.insert(key, entry);
    }

    /// Look up a live entry
    pub fn get(&self, key: &LabelKey) -> Result<Arc<Labels>, CacheMiss> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Arc::clone(&entry.labels)),
            _ => Err(CacheMiss { key: key.clone() }),
        }
    }

    /// Labels for a resource of `kind` named `identifier` in `namespace`
    pub fn get_labels_for(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        cluster: &str,
        identifier: &str,
    ) -> Result<Arc<Labels>, CacheMiss> {
        self.get(&LabelKey::new(cluster, kind.clone(), namespace, identifier))
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = LabelCache::default();
        let key = LabelKey::new("c1", ResourceKind::Deployment, "ns", "web");
        cache.insert(key.clone(), labels(&[("team", "core")]));

        let found = cache.get(&key).unwrap();
        assert_eq!(found.get("team").map(String::as_str), Some("core"));

        let via_parts = cache
            .get_labels_for(&ResourceKind::Deployment, "ns", "c1", "web")
            .unwrap();
        assert_eq!(via_parts, found);
    }

    #[test]
    fn test_missing_entry_is_cache_miss() {
        let cache = LabelCache::default();
        let err = cache
            .get_labels_for(&ResourceKind::Job, "ns", "c1", "report")
            .unwrap_err();
        assert_eq!(err.key.identifier, "report");
        assert!(err.to_string().contains("identifier=report"));
    }

    #[test]
    fn test_empty_label_set_is_a_hit() {
        let cache = LabelCache::default();
        let key = LabelKey::namespace("c1", "default");
        cache.insert(key.clone(), Labels::new());

        assert!(cache.get(&key).unwrap().is_empty());
    }

    #[test]
    fn test_expired_entry_is_cache_miss() {
        let cache = LabelCache::new(Duration::ZERO);
        let key = LabelKey::new("c1", ResourceKind::Deployment, "ns", "web");
        cache.insert(key.clone(), labels(&[("team", "core")]));

        assert!(cache.get(&key).is_err());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let cache = LabelCache::new(Duration::from_secs(u64::MAX));
        let key = LabelKey::new("c1", ResourceKind::Deployment, "ns", "web");
        cache.insert(key.clone(), labels(&[("team", "core")]));

        assert_eq!(cache.get(&key).unwrap()["team"], "core");
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = LabelCache::default();
        let key = LabelKey::new("c1", ResourceKind::StatefulSet, "ns", "db");
        cache.insert(key.clone(), labels(&[("tier", "old")]));
        cache.insert(key.clone(), labels(&[("tier", "new")]));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap()["tier"], "new");
    }

    #[test]
    fn test_keys_do_not_collide_on_separators() {
        let cache = LabelCache::default();
        let a = LabelKey::new("c1:Job", ResourceKind::Job, "ns", "x");
        let b = LabelKey::new("c1", ResourceKind::Job, "Job:ns", "x");
        cache.insert(a.clone(), labels(&[("k", "a")]));

        assert!(cache.get(&b).is_err());
        assert_eq!(cache.get(&a).unwrap()["k"], "a");
    }

    #[test]
    fn test_readers_see_whole_label_sets_during_refresh() {
        let cache = Arc::new(LabelCache::default());
        let key = LabelKey::new("c1", ResourceKind::Deployment, "ns", "web");
        cache.insert(key.clone(), labels(&[("team", "a"), ("tier", "a")]));

        let writer = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            std::thread::spawn(move || {
                for i in 0..2000 {
                    let v = if i % 2 == 0 { "b" } else { "a" };
                    cache.insert(key.clone(), labels(&[("team", v), ("tier", v)]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let found = cache.get(&key).unwrap();
                        assert_eq!(found.len(), 2);
                        assert_eq!(found["team"], found["tier"]);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_namespace_key_uses_name_twice() {
        let key = LabelKey::namespace("c1", "payments");
        assert_eq!(key.kind, ResourceKind::Namespace);
        assert_eq!(key.namespace, "payments");
        assert_eq!(key.identifier, "payments");
    }
}
