use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// The default debounce window for file-change bursts.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

/// One observed change to a vault file.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub path: String,
    pub kind: FileChangeKind,
    pub timestamp: SystemTime,
    /// The previous path for [`FileChangeKind::Renamed`].
    pub old_path: Option<String>,
}

impl FileChangeEvent {
    pub fn new(path: impl Into<String>, kind: FileChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: SystemTime::now(),
            old_path: None,
        }
    }

    pub fn renamed(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            path: new_path.into(),
            kind: FileChangeKind::Renamed,
            timestamp: SystemTime::now(),
            old_path: Some(old_path.into()),
        }
    }
}

type ChangeCallback = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;

/// Debounces file-change events and drives invalidation callbacks.
///
/// Changes are deduplicated per path (the last change wins) and held for a
/// throttle window. [`IncrementalIndexer::flush`] drains everything pending;
/// [`IncrementalIndexer::observe`] additionally schedules a debounced flush
/// when called inside a tokio runtime.
pub struct IncrementalIndexer {
    pending: Mutex<PendingChanges>,
    callbacks: RwLock<Vec<ChangeCallback>>,
    throttle: Duration,
    flush_scheduled: AtomicBool,
}

#[derive(Default)]
struct PendingChanges {
    /// Path → index into `order`, so the last change per path wins while
    /// first-seen order is kept for delivery.
    by_path: FxHashMap<String, usize>,
    order: Vec<FileChangeEvent>,
}

impl Default for IncrementalIndexer {
    fn default() -> Self {
        Self::with_throttle(DEFAULT_THROTTLE)
    }
}

impl IncrementalIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            pending: Mutex::new(PendingChanges::default()),
            callbacks: RwLock::new(Vec::new()),
            throttle,
            flush_scheduled: AtomicBool::new(false),
        }
    }

    /// Registers an invalidation callback, fired once per flushed change.
    pub fn on_change(&self, callback: impl Fn(&FileChangeEvent) + Send + Sync + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Records a change; the last change per path wins.
    pub fn observe(&self, event: FileChangeEvent) {
        let mut pending = self.pending.lock();
        match pending.by_path.get(&event.path).copied() {
            Some(index) => pending.order[index] = event,
            None => {
                let index = pending.order.len();
                pending.by_path.insert(event.path.clone(), index);
                pending.order.push(event);
            }
        }
    }

    /// Records a change and schedules a debounced flush on the current tokio
    /// runtime.
    pub fn observe_debounced(self: &Arc<Self>, event: FileChangeEvent) {
        self.observe(event);
        if self
            .flush_scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let indexer = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(indexer.throttle).await;
                indexer.flush_scheduled.store(false, Ordering::Release);
                indexer.flush();
            });
        }
    }

    /// Drains every pending change and fires the callbacks. Afterwards no
    /// deferred changes remain.
    pub fn flush(&self) {
        let drained = {
            let mut pending = self.pending.lock();
            pending.by_path.clear();
            std::mem::take(&mut pending.order)
        };
        if drained.is_empty() {
            return;
        }
        debug!(changes = drained.len(), "flushing deferred file changes");
        let callbacks = self.callbacks.read().clone();
        for event in &drained {
            for callback in &callbacks {
                callback(event);
            }
        }
    }

    /// How many deduplicated changes are waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn last_change_per_path_wins() {
        let indexer = IncrementalIndexer::new();
        indexer.observe(FileChangeEvent::new("a.md", FileChangeKind::Created));
        indexer.observe(FileChangeEvent::new("a.md", FileChangeKind::Deleted));
        indexer.observe(FileChangeEvent::new("b.md", FileChangeKind::Modified));
        assert_eq!(indexer.pending_len(), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        indexer.on_change(move |event| {
            sink.lock().push((event.path.clone(), event.kind));
        });
        indexer.flush();
        assert_eq!(
            *seen.lock(),
            vec![
                ("a.md".to_owned(), FileChangeKind::Deleted),
                ("b.md".to_owned(), FileChangeKind::Modified),
            ]
        );
    }

    #[test]
    fn flush_leaves_nothing_pending() {
        let indexer = IncrementalIndexer::new();
        indexer.observe(FileChangeEvent::new("a.md", FileChangeKind::Modified));
        indexer.flush();
        assert_eq!(indexer.pending_len(), 0);
        // A second flush fires nothing.
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        indexer.on_change(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });
        indexer.flush();
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn rename_events_carry_the_old_path() {
        let event = FileChangeEvent::renamed("old.md", "new.md");
        assert_eq!(event.kind, FileChangeKind::Renamed);
        assert_eq!(event.old_path.as_deref(), Some("old.md"));
        assert_eq!(event.path, "new.md");
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_flush_fires_after_the_window() {
        let indexer = Arc::new(IncrementalIndexer::with_throttle(Duration::from_millis(
            500,
        )));
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        indexer.on_change(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });
        indexer.observe_debounced(FileChangeEvent::new("a.md", FileChangeKind::Modified));
        indexer.observe_debounced(FileChangeEvent::new("a.md", FileChangeKind::Modified));
        assert_eq!(count.load(Ordering::Relaxed), 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        // Both observations collapsed into a single flushed change.
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(indexer.pending_len(), 0);
    }
}
