#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod cache;
mod indexer;

pub use crate::cache::{normalize_query, QueryResultCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use crate::indexer::{
    FileChangeEvent, FileChangeKind, IncrementalIndexer, DEFAULT_THROTTLE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn indexer_drives_cache_invalidation() {
        let cache: Arc<QueryResultCache<u64>> = Arc::new(QueryResultCache::new());
        let indexer = IncrementalIndexer::new();
        let hook = Arc::clone(&cache);
        indexer.on_change(move |event| {
            hook.invalidate_by_file(&event.path);
            if let Some(old_path) = &event.old_path {
                hook.invalidate_by_file(old_path);
            }
        });

        cache.set("q1", 1, &["a.md".to_owned()]);
        cache.set("q2", 2, &["b.md".to_owned()]);

        indexer.observe(FileChangeEvent::new("a.md", FileChangeKind::Modified));
        // Not yet flushed: the entry is still visible.
        assert_eq!(cache.get("q1"), Some(1));

        indexer.flush();
        assert_eq!(cache.get("q1"), None);
        assert_eq!(cache.get("q2"), Some(2));

        // Renames invalidate through both names.
        cache.set("q3", 3, &["b.md".to_owned()]);
        indexer.observe(FileChangeEvent::renamed("b.md", "c.md"));
        indexer.flush();
        assert_eq!(cache.get("q2"), None);
        assert_eq!(cache.get("q3"), None);
    }
}
