//! Observable list model.
//!
//! # Responsibility
//! - Hold the canonical ordered collection for one domain entity.
//! - Broadcast change notifications according to the caller's `Notify` mode.
//!
//! # Invariants
//! - `size()` always equals the number of elements retrievable by index.
//! - No notification fires while the model lock is held.
//! - Every content change bumps the generation under the same lock, so a
//!   view can tell a stale projection from a current one without waiting
//!   for the notification.
//! - Insertion order is display order.

use crate::model::notify::{
    ModelListener, NotificationDispatcher, Notifier, Notify, SubscriptionId,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Read-only observable sequence, implemented by list and proxy models.
pub trait ObservableList<T>: Send + Sync {
    fn size(&self) -> usize;

    /// Returns the element at `index`, or `None` when out of range.
    fn try_get(&self, index: usize) -> Option<T>;

    /// Returns the element at `index`.
    ///
    /// # Panics
    /// Panics when `index >= size()`; that is a caller bug.
    fn get(&self, index: usize) -> T {
        match self.try_get(index) {
            Some(item) => item,
            None => panic!("list index {index} out of range for size {}", self.size()),
        }
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Counter that moves whenever the visible contents change, notified or not.
    fn generation(&self) -> u64;

    /// Copies the contents together with the generation they belong to.
    fn versioned_snapshot(&self) -> (u64, Vec<T>);

    fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

struct ListState<T, M> {
    items: Vec<T>,
    meta: M,
    generation: u64,
}

impl<T, M> ListState<T, M> {
    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Ordered, observable collection with optional adjacent metadata `M`.
///
/// `M` lives under the same lock as the elements, for aggregates that must
/// never be observed out of step with the sequence.
pub struct ListModel<T, M = ()> {
    state: Mutex<ListState<T, M>>,
    notifier: Arc<Notifier>,
}

impl<T, M: Default> ListModel<T, M> {
    pub fn new(dispatcher: &NotificationDispatcher) -> Self {
        Self {
            state: Mutex::new(ListState {
                items: Vec::new(),
                meta: M::default(),
                generation: 0,
            }),
            notifier: Notifier::new(dispatcher),
        }
    }
}

impl<T: Clone, M> ListModel<T, M> {
    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn try_get(&self, index: usize) -> Option<T> {
        self.state.lock().items.get(index).cloned()
    }

    /// Returns the element at `index`.
    ///
    /// # Panics
    /// Panics when `index >= size()`.
    pub fn get(&self, index: usize) -> T {
        let state = self.state.lock();
        match state.items.get(index) {
            Some(item) => item.clone(),
            None => panic!(
                "list index {index} out of range for size {}",
                state.items.len()
            ),
        }
    }

    /// Copies the current sequence.
    pub fn snapshot(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn add_item(&self, item: T, notify: Notify) {
        {
            let mut state = self.state.lock();
            state.items.push(item);
            state.touch();
        }
        self.notifier.notify(notify);
    }

    /// Appends a batch; listeners see at most one notification for it.
    pub fn add_items(&self, items: impl IntoIterator<Item = T>, notify: Notify) {
        let added = {
            let mut state = self.state.lock();
            let before = state.items.len();
            state.items.extend(items);
            let added = state.items.len() - before;
            if added > 0 {
                state.touch();
            }
            added
        };
        if added > 0 {
            self.notifier.notify(notify);
        }
    }

    pub fn clear(&self, notify: Notify) {
        {
            let mut state = self.state.lock();
            state.items.clear();
            state.touch();
        }
        self.notifier.notify(notify);
    }

    /// Clears and refills the sequence with one notification.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>, notify: Notify) {
        {
            let mut state = self.state.lock();
            state.items.clear();
            state.items.extend(items);
            state.touch();
        }
        self.notifier.notify(notify);
    }

    /// Removes every element matching `predicate`, wherever it sits.
    ///
    /// Notifies only when something was removed.
    pub fn remove_where(
        &self,
        mut predicate: impl FnMut(&T) -> bool,
        notify: Notify,
    ) -> Vec<T> {
        let removed = {
            let mut state = self.state.lock();
            let mut removed = Vec::new();
            let mut kept = Vec::with_capacity(state.items.len());
            for item in state.items.drain(..) {
                if predicate(&item) {
                    removed.push(item);
                } else {
                    kept.push(item);
                }
            }
            state.items = kept;
            if !removed.is_empty() {
                state.touch();
            }
            removed
        };
        if !removed.is_empty() {
            self.notifier.notify(notify);
        }
        removed
    }

    /// Keeps only items matching `predicate`; returns how many were dropped.
    pub fn retain(&self, mut predicate: impl FnMut(&T) -> bool, notify: Notify) -> usize {
        self.remove_where(|item| !predicate(item), notify).len()
    }

    /// Returns a copy of the first element matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.state
            .lock()
            .items
            .iter()
            .find(|item| predicate(item))
            .cloned()
    }

    /// Mutates elements and metadata inside one lock scope.
    pub fn update<R>(&self, notify: Notify, f: impl FnOnce(&mut Vec<T>, &mut M) -> R) -> R {
        let result = {
            let mut state = self.state.lock();
            state.touch();
            let ListState { items, meta, .. } = &mut *state;
            f(items, meta)
        };
        self.notifier.notify(notify);
        result
    }

    /// Reads elements and metadata inside one lock scope.
    pub fn read<R>(&self, f: impl FnOnce(&[T], &M) -> R) -> R {
        let state = self.state.lock();
        f(&state.items, &state.meta)
    }

    pub fn meta(&self) -> M
    where
        M: Clone,
    {
        self.state.lock().meta.clone()
    }

    pub fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn versioned_snapshot(&self) -> (u64, Vec<T>) {
        let state = self.state.lock();
        (state.generation, state.items.clone())
    }

    /// Signals a change made earlier under a weaker notification mode.
    pub(crate) fn notify(&self, mode: Notify) {
        self.notifier.notify(mode);
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }
}

impl<T, M> ObservableList<T> for ListModel<T, M>
where
    T: Clone + Send + Sync,
    M: Send,
{
    fn size(&self) -> usize {
        ListModel::size(self)
    }

    fn try_get(&self, index: usize) -> Option<T> {
        ListModel::try_get(self, index)
    }

    fn generation(&self) -> u64 {
        ListModel::generation(self)
    }

    fn versioned_snapshot(&self) -> (u64, Vec<T>) {
        ListModel::versioned_snapshot(self)
    }

    fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        ListModel::subscribe(self, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        ListModel::unsubscribe(self, id);
    }
}

#[cfg(test)]
mod tests {
    use super::ListModel;
    use crate::model::notify::{ModelListener, NotificationDispatcher, Notify};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn listen(model: &ListModel<i32>) -> (Arc<AtomicUsize>, Arc<dyn ModelListener>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener: Arc<dyn ModelListener> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        model.subscribe(&listener);
        (hits, listener)
    }

    #[test]
    fn silent_mutations_never_reach_listeners() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        let (hits, _listener) = listen(&model);

        model.add_item(1, Notify::None);
        model.add_items([2, 3, 4], Notify::None);
        model.clear(Notify::None);
        model.add_item(5, Notify::None);
        dispatcher.process_pending();

        assert_eq!(model.size(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_then_batch_add_notifies_once() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        let (hits, _listener) = listen(&model);

        model.add_items([1, 2], Notify::Deferred);
        model.clear(Notify::None);
        model.add_items([7, 8, 9], Notify::Deferred);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dispatcher.process_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(model.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn immediate_mutation_notifies_before_returning() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        let (hits, _listener) = listen(&model);

        model.add_item(42, Notify::Immediate);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(model.get(0), 42);
    }

    #[test]
    fn empty_batch_does_not_notify() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        let (hits, _listener) = listen(&model);

        model.add_items(Vec::new(), Notify::Immediate);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_where_removes_from_any_position() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        model.add_items([1, 2, 3, 4, 5], Notify::None);
        let (hits, _listener) = listen(&model);

        let removed = model.remove_where(|value| value % 2 == 0, Notify::Immediate);
        assert_eq!(removed, vec![2, 4]);
        assert_eq!(model.snapshot(), vec![1, 3, 5]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let none = model.remove_where(|value| *value > 100, Notify::Immediate);
        assert!(none.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn update_sees_items_and_meta_together() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32, usize>::new(&dispatcher);

        model.update(Notify::None, |items, total| {
            items.extend([3, 4]);
            *total = items.iter().map(|value| *value as usize).sum();
        });

        assert_eq!(model.meta(), 7);
        assert_eq!(model.read(|items, total| items.len() + *total), 9);
    }

    #[test]
    fn generation_moves_only_when_contents_change() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        let start = model.generation();

        model.add_items(Vec::new(), Notify::None);
        model.remove_where(|_| true, Notify::None);
        assert_eq!(model.generation(), start);

        model.add_item(1, Notify::None);
        let (generation, items) = model.versioned_snapshot();
        assert_ne!(generation, start);
        assert_eq!(items, vec![1]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_out_of_range_panics() {
        let dispatcher = NotificationDispatcher::new();
        let model = ListModel::<i32>::new(&dispatcher);
        model.add_item(1, Notify::None);
        let _ = model.get(1);
    }
}
