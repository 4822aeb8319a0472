use crate::types::{ProgressRecord, QuizProgress};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, warn};

pub type Listener = Arc<dyn Fn(&str, &Arc<ProgressRecord>) + Send + Sync>;
pub type ResetListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
enum Watcher {
    Set(Listener),
    Reset(ResetListener),
}

#[derive(Default)]
struct StoreInner {
    records: RwLock<HashMap<String, Arc<ProgressRecord>>>,
    listeners: RwLock<Vec<(u64, Watcher)>>,
    next_listener_id: AtomicU64,
}

/// Latest submitted state of every interaction on a page.
///
/// Handlers come and go as the page re-renders; the store outlives them and
/// is what views render from. Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct ProgressStore {
    inner: Arc<StoreInner>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `id` and notify every listener.
    pub fn set(&self, id: &str, record: impl Into<Arc<ProgressRecord>>) -> Arc<ProgressRecord> {
        let record = record.into();
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), record.clone());

        for watcher in self.watchers() {
            if let Watcher::Set(listener) = watcher {
                listener(id, &record);
            }
        }

        record
    }

    pub fn get(&self, id: &str) -> Option<Arc<ProgressRecord>> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Register a listener; it stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str, &Arc<ProgressRecord>) + Send + Sync + 'static,
    {
        self.watch(Watcher::Set(Arc::new(listener)))
    }

    /// Register a callback run after every [`reset`](Self::reset).
    pub fn on_reset<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.watch(Watcher::Reset(Arc::new(listener)))
    }

    /// Forget every record (session navigation). Listeners stay registered
    /// and reset callbacks run once the records are gone.
    pub fn reset(&self) {
        self.inner.records.write().unwrap_or_else(PoisonError::into_inner).clear();
        debug!("Progress store reset");

        for watcher in self.watchers() {
            if let Watcher::Reset(listener) = watcher {
                listener();
            }
        }
    }

    fn watch(&self, watcher: Watcher) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, watcher));

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    // Snapshot so callbacks run outside the lock and may read the store.
    fn watchers(&self) -> Vec<Watcher> {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, watcher)| watcher.clone())
            .collect()
    }

    /// Load previously submitted records. Entries whose details do not decode
    /// are skipped. Returns how many records were loaded.
    pub fn rehydrate(&self, progress: HashMap<String, QuizProgress>) -> usize {
        let mut loaded = 0;
        for (id, entry) in progress {
            match serde_json::from_value::<ProgressRecord>(entry.details) {
                Ok(record) => {
                    self.set(&id, record);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping unreadable progress for {}: {}", id, e),
            }
        }
        debug!("Rehydrated {} progress records", loaded);
        loaded
    }

    /// Percentage of `ids` that have a record, rounded.
    pub fn percent_complete(&self, ids: &[String]) -> u8 {
        if ids.is_empty() {
            return 0;
        }
        let records = self.inner.records.read().unwrap_or_else(PoisonError::into_inner);
        let done = ids.iter().filter(|id| records.contains_key(id.as_str())).count();
        (done as f64 / ids.len() as f64 * 100.0).round() as u8
    }

    fn unsubscribe_listener(inner: &StoreInner, id: u64) {
        inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Handle returned by [`ProgressStore::subscribe`].
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            ProgressStore::unsubscribe_listener(&inner, self.id);
        }
    }
}

/// Read-only "N of M complete" view over a fixed set of ids, recomputed from
/// the store whenever one of them changes or the store is reset.
pub struct CompletionView {
    percent: Arc<AtomicU8>,
    _subscriptions: [Subscription; 2],
}

impl CompletionView {
    pub fn new(store: &ProgressStore, ids: Vec<String>) -> Self {
        let percent = Arc::new(AtomicU8::new(store.percent_complete(&ids)));
        let watched: HashSet<String> = ids.iter().cloned().collect();

        let ids = Arc::new(ids);

        let reader = store.clone();
        let target = percent.clone();
        let tracked = ids.clone();
        let on_set = store.subscribe(move |id, _| {
            if watched.contains(id) {
                target.store(reader.percent_complete(&tracked), Ordering::Relaxed);
            }
        });

        let reader = store.clone();
        let target = percent.clone();
        let on_reset = store.on_reset(move || {
            target.store(reader.percent_complete(&ids), Ordering::Relaxed);
        });

        Self {
            percent,
            _subscriptions: [on_set, on_reset],
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }
}
