use crate::models::{Person, Plan};
use crate::store::EntityStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type BatchFetch<V> = Box<dyn Fn(&[i64]) -> Vec<Option<V>> + Send + Sync>;

/// Request-scoped deduplicating loader for one entity type.
///
/// Identifiers collected while a response level is being resolved are flushed
/// as a single batch fetch against the store; every distinct identifier is
/// fetched at most once for the lifetime of the loader, no matter how many
/// times it is requested. Loaders are built fresh for every request context,
/// so nothing here outlives or leaks across requests.
pub struct BatchLoader<V: Clone> {
    state: Mutex<LoaderState<V>>,
    fetch: BatchFetch<V>,
    fetches: AtomicUsize,
}

struct LoaderState<V> {
    /// Results for identifiers already fetched. `None` means the store was
    /// asked and had no such entity.
    resolved: HashMap<i64, Option<V>>,
    /// Distinct identifiers queued for the next flush.
    pending: Vec<i64>,
}

impl<V: Clone> BatchLoader<V> {
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(&[i64]) -> Vec<Option<V>> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(LoaderState {
                resolved: HashMap::new(),
                pending: Vec::new(),
            }),
            fetch: Box::new(fetch),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Queues `id` for the next batch flush unless it is already resolved or
    /// already queued.
    pub fn enqueue(&self, id: i64) {
        let mut state = self.state.lock().expect("loader lock poisoned");
        if !state.resolved.contains_key(&id) && !state.pending.contains(&id) {
            state.pending.push(id);
        }
    }

    /// Fetches every queued identifier in one underlying batch.
    pub fn flush(&self) {
        let mut state = self.state.lock().expect("loader lock poisoned");
        if state.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut state.pending);
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let results = (self.fetch)(&batch);
        for (id, result) in batch.into_iter().zip(results) {
            state.resolved.insert(id, result);
        }
    }

    /// Returns the entity for `id`, fetching it (and anything else queued)
    /// if it has not been resolved yet.
    pub fn load(&self, id: i64) -> Option<V> {
        self.enqueue(id);
        self.flush();
        let state = self.state.lock().expect("loader lock poisoned");
        state.resolved.get(&id).cloned().flatten()
    }

    /// Number of underlying batch fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

/// The loader pair bound to one request: people and plans.
pub struct Loaders {
    pub people: BatchLoader<Person>,
    pub plans: BatchLoader<Plan>,
}

impl Loaders {
    /// Factory invoked once per request context.
    pub fn new(store: Arc<EntityStore>) -> Self {
        let people_store = Arc::clone(&store);
        let plans_store = store;
        Self {
            people: BatchLoader::new(move |ids| people_store.people_by_ids(ids)),
            plans: BatchLoader::new(move |ids| plans_store.plans_by_ids(ids)),
        }
    }
}
