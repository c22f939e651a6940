use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// The default entry lifetime: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// The default capacity of the result cache.
pub const DEFAULT_CAPACITY: usize = 256;

/// An LRU cache for materialized query results, keyed by normalized query
/// text, with per-file dependency tracking for incremental invalidation.
///
/// ```
/// use mindcache::QueryResultCache;
///
/// let cache = QueryResultCache::new();
/// cache.set("SELECT * WHERE { ?s ?p ?o }", 42, &["notes/a.md".to_owned()]);
/// assert_eq!(cache.get("SELECT  *  WHERE { ?s ?p ?o }"), Some(42));
/// cache.invalidate_by_file("notes/a.md");
/// assert_eq!(cache.get("SELECT * WHERE { ?s ?p ?o }"), None);
/// ```
pub struct QueryResultCache<V: Clone + Hash> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    /// File path → the cache keys whose results were derived from it.
    file_dependencies: DashMap<String, FxHashSet<String>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    files: Vec<String>,
    hash: u64,
}

impl<V: Clone + Hash> Default for QueryResultCache<V> {
    fn default() -> Self {
        Self::with_config(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<V: Clone + Hash> QueryResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            file_dependencies: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a fresh entry; TTL-expired entries are evicted on the way.
    pub fn get(&self, query: &str) -> Option<V> {
        let key = normalize_query(query);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores a result and records which files contributed to it.
    pub fn set(&self, query: &str, value: V, files: &[String]) {
        let key = normalize_query(query);
        let mut hasher = SipHasher13::new();
        value.hash(&mut hasher);
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            files: files.to_vec(),
            hash: hasher.finish(),
        };
        for file in files {
            self.file_dependencies
                .entry(file.clone())
                .or_default()
                .insert(key.clone());
        }
        let mut entries = self.entries.lock();
        if let Some((_, evicted)) = entries.push(key, entry) {
            // Capacity eviction: drop the stale dependency edges.
            for file in &evicted.files {
                if let Some(mut keys) = self.file_dependencies.get_mut(file) {
                    keys.retain(|k| entries.contains(k));
                }
            }
        }
    }

    /// The SipHash of a cached result, for change detection.
    pub fn result_hash(&self, query: &str) -> Option<u64> {
        let key = normalize_query(query);
        self.entries.lock().peek(&key).map(|entry| entry.hash)
    }

    /// Evicts every entry whose result depends on `path`.
    pub fn invalidate_by_file(&self, path: &str) {
        let Some((_, keys)) = self.file_dependencies.remove(path) else {
            return;
        };
        let mut entries = self.entries.lock();
        let mut evicted = 0_usize;
        for key in keys {
            if entries.pop(&key).is_some() {
                evicted += 1;
            }
        }
        debug!(path, evicted, "invalidated cache entries for changed file");
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
        self.file_dependencies.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Collapses whitespace runs outside string literals to single spaces, so
/// format-only differences share a cache entry.
pub fn normalize_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let chars: Vec<char> = query.chars().collect();
    let mut i = 0;
    let mut pending_space = false;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            let quote = c;
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '\\' && i + 1 < chars.len() {
                    out.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if chars[i] == quote {
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else if c.is_whitespace() {
            pending_space = true;
            i += 1;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_but_not_literals() {
        assert_eq!(
            normalize_query("SELECT  ?x\nWHERE   { ?x ?p \"a  b\" }"),
            "SELECT ?x WHERE { ?x ?p \"a  b\" }"
        );
        assert_eq!(
            normalize_query("  SELECT ?x  "),
            "SELECT ?x"
        );
    }

    #[test]
    fn get_after_set_hits() {
        let cache = QueryResultCache::new();
        cache.set("SELECT 1", "result".to_owned(), &[]);
        assert_eq!(cache.get("SELECT   1"), Some("result".to_owned()));
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.get("SELECT 2"), None);
        assert_eq!(cache.miss_count(), 1);
    }

    #[test]
    fn ttl_expiry_misses() {
        let cache = QueryResultCache::with_config(8, Duration::ZERO);
        cache.set("SELECT 1", 1, &[]);
        assert_eq!(cache.get("SELECT 1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn file_invalidation_evicts_dependents_only() {
        let cache = QueryResultCache::new();
        cache.set("q1", 1, &["a.md".to_owned(), "b.md".to_owned()]);
        cache.set("q2", 2, &["b.md".to_owned()]);
        cache.set("q3", 3, &["c.md".to_owned()]);
        cache.invalidate_by_file("b.md");
        assert_eq!(cache.get("q1"), None);
        assert_eq!(cache.get("q2"), None);
        assert_eq!(cache.get("q3"), Some(3));
    }

    #[test]
    fn invalidating_twice_is_harmless() {
        let cache = QueryResultCache::new();
        cache.set("q1", 1, &["a.md".to_owned()]);
        cache.invalidate_by_file("a.md");
        cache.invalidate_by_file("a.md");
        assert_eq!(cache.get("q1"), None);
    }

    #[test]
    fn lru_capacity_evicts_oldest() {
        let cache = QueryResultCache::with_config(2, DEFAULT_TTL);
        cache.set("q1", 1, &[]);
        cache.set("q2", 2, &[]);
        cache.set("q3", 3, &[]);
        assert_eq!(cache.get("q1"), None);
        assert_eq!(cache.get("q2"), Some(2));
        assert_eq!(cache.get("q3"), Some(3));
    }

    #[test]
    fn result_hash_is_stable_per_value() {
        let cache = QueryResultCache::new();
        cache.set("q1", "same".to_owned(), &[]);
        cache.set("q2", "same".to_owned(), &[]);
        assert_eq!(cache.result_hash("q1"), cache.result_hash("q2"));
    }
}
