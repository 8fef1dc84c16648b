//! Filtering and sorting view over an observable list.
//!
//! # Responsibility
//! - Present a read-only projection of a source model: the accepted source
//!   indices plus the elements they pointed at when the projection was built.
//!
//! # Invariants
//! - The projection holds exactly the source indices accepted by the filter,
//!   in source order unless a sorter is set, then stably sorted by element.
//! - Every read first compares the source generation with the one the
//!   projection was built from and rebuilds on mismatch, so `size()` and
//!   `get(i)` agree even before a deferred source notification arrives.
//! - A source notification or a filter or sorter change is followed by
//!   exactly one notification to the proxy's listeners.
//! - A dropped proxy detaches from its source.

use crate::model::list::ObservableList;
use crate::model::notify::{
    ModelListener, NotificationDispatcher, Notifier, Notify, SubscriptionId,
};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::{Arc, Weak};

/// Element predicate deciding proxy membership.
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
/// Element comparator deciding proxy order.
pub type Sorter<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

struct AttachedSource<T> {
    model: Arc<dyn ObservableList<T>>,
    subscription: SubscriptionId,
}

struct Row<T> {
    source_index: usize,
    item: T,
}

struct ProxyState<T> {
    source: Option<AttachedSource<T>>,
    rows: Vec<Row<T>>,
    filter: Filter<T>,
    sorter: Option<Sorter<T>>,
    /// Source generation the rows were built from; `None` forces a rebuild.
    synced: Option<u64>,
    /// Own generation, bumped on every rebuild, read by chained proxies.
    generation: u64,
}

impl<T: Clone> ProxyState<T> {
    /// Rebuilds when the source moved since the last build.
    fn sync(&mut self) {
        let current = self
            .source
            .as_ref()
            .map(|source| source.model.generation());
        if current != self.synced {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        let (synced, rows) = match &self.source {
            None => (None, Vec::new()),
            Some(source) => {
                let (generation, items) = source.model.versioned_snapshot();
                let mut rows: Vec<Row<T>> = items
                    .into_iter()
                    .enumerate()
                    .filter(|(_, item)| (self.filter)(item))
                    .map(|(source_index, item)| Row { source_index, item })
                    .collect();
                if let Some(sorter) = &self.sorter {
                    rows.sort_by(|left, right| sorter(&left.item, &right.item));
                }
                (Some(generation), rows)
            }
        };
        self.synced = synced;
        self.rows = rows;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Forwards source notifications to the proxy that owns it.
struct SourceLink<T> {
    proxy: Weak<ProxyModel<T>>,
}

impl<T> ModelListener for SourceLink<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn model_changed(&self) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.source_changed();
        }
    }
}

/// Filtered, optionally sorted view over one source model.
pub struct ProxyModel<T> {
    state: Mutex<ProxyState<T>>,
    notifier: Arc<Notifier>,
    link: Arc<dyn ModelListener>,
}

impl<T> ProxyModel<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a detached proxy that accepts everything and keeps source order.
    pub fn new(dispatcher: &NotificationDispatcher) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let accept_all: Filter<T> = Arc::new(|_: &T| true);
            let link: Arc<dyn ModelListener> = Arc::new(SourceLink {
                proxy: weak.clone(),
            });
            Self {
                state: Mutex::new(ProxyState {
                    source: None,
                    rows: Vec::new(),
                    filter: accept_all,
                    sorter: None,
                    synced: None,
                    generation: 0,
                }),
                notifier: Notifier::new(dispatcher),
                link,
            }
        })
    }

    /// Attaches to `source` (detaching from any previous one) and rebuilds.
    ///
    /// `None` leaves the proxy detached with an empty projection.
    pub fn set_model(&self, source: Option<Arc<dyn ObservableList<T>>>) {
        {
            let mut state = self.state.lock();
            if let Some(previous) = state.source.take() {
                previous.model.unsubscribe(previous.subscription);
            }
            state.source = source.map(|model| {
                let subscription = model.subscribe(&self.link);
                AttachedSource {
                    model,
                    subscription,
                }
            });
        }
        self.filter_changed();
    }

    pub fn has_model(&self) -> bool {
        self.state.lock().source.is_some()
    }

    pub fn set_filter(&self, filter: impl Fn(&T) -> bool + Send + Sync + 'static) {
        self.state.lock().filter = Arc::new(filter);
        self.filter_changed();
    }

    /// Replaces the comparator; `None` restores source order.
    pub fn set_sorter(&self, sorter: Option<Sorter<T>>) {
        self.state.lock().sorter = sorter;
        self.filter_changed();
    }

    /// Convenience for `set_sorter(Some(..))`.
    pub fn sort_by(&self, compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) {
        self.set_sorter(Some(Arc::new(compare)));
    }

    /// Rebuilds the projection and notifies proxy listeners once.
    pub fn filter_changed(&self) {
        self.state.lock().rebuild();
        self.notifier.notify(Notify::Immediate);
    }

    /// A read may already have caught up with the source; listeners are told
    /// either way.
    fn source_changed(&self) {
        self.state.lock().sync();
        self.notifier.notify(Notify::Immediate);
    }

    fn with_synced<R>(&self, f: impl FnOnce(&ProxyState<T>) -> R) -> R {
        let mut state = self.state.lock();
        state.sync();
        f(&*state)
    }

    pub fn size(&self) -> usize {
        self.with_synced(|state| state.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Maps a projection index to the underlying source index.
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.with_synced(|state| state.rows.get(index).map(|row| row.source_index))
    }

    pub fn try_get(&self, index: usize) -> Option<T> {
        self.with_synced(|state| state.rows.get(index).map(|row| row.item.clone()))
    }

    /// Returns the element at projection position `index`.
    ///
    /// # Panics
    /// Panics when `index >= size()`.
    pub fn get(&self, index: usize) -> T {
        self.with_synced(|state| match state.rows.get(index) {
            Some(row) => row.item.clone(),
            None => panic!(
                "proxy index {index} out of range for size {}",
                state.rows.len()
            ),
        })
    }

    /// Copies the projected elements in projection order.
    pub fn snapshot(&self) -> Vec<T> {
        self.with_synced(|state| state.rows.iter().map(|row| row.item.clone()).collect())
    }

    pub fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }
}

impl<T> ObservableList<T> for ProxyModel<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn size(&self) -> usize {
        ProxyModel::size(self)
    }

    fn try_get(&self, index: usize) -> Option<T> {
        ProxyModel::try_get(self, index)
    }

    fn generation(&self) -> u64 {
        self.with_synced(|state| state.generation)
    }

    fn versioned_snapshot(&self) -> (u64, Vec<T>) {
        self.with_synced(|state| {
            let items = state.rows.iter().map(|row| row.item.clone()).collect();
            (state.generation, items)
        })
    }

    fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        ProxyModel::subscribe(self, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        ProxyModel::unsubscribe(self, id);
    }
}

impl<T> Drop for ProxyModel<T> {
    fn drop(&mut self) {
        if let Some(source) = self.state.get_mut().source.take() {
            source.model.unsubscribe(source.subscription);
        }
    }
}
