//! Listener registry and deferred notification dispatcher.
//!
//! # Responsibility
//! - Track model listeners through weak back-references.
//! - Coalesce deferred change notifications into one delivery per UI pass.
//! - Marshal work posted from background tasks onto the UI pass.
//!
//! # Invariants
//! - Listener callbacks never run while a registry lock is held.
//! - A dirty notifier is queued at most once until it is delivered.
//! - Dropped listeners are pruned and never called.
//!
//! Listeners must still unsubscribe during their own teardown; the registry
//! only guarantees that a dropped listener is skipped.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Receives `model_changed` callbacks from an observable model.
pub trait ModelListener: Send + Sync {
    fn model_changed(&self);
}

impl<F> ModelListener for F
where
    F: Fn() + Send + Sync,
{
    fn model_changed(&self) {
        self()
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification mode carried by every mutating model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    /// Mutate silently.
    None,
    /// Mark dirty; deliver once on the next dispatcher pass.
    Deferred,
    /// Deliver synchronously before the mutating call returns.
    Immediate,
}

enum Pending {
    Deliver(Weak<Notifier>),
    Run(Box<dyn FnOnce() + Send>),
}

#[derive(Default)]
struct DispatcherInner {
    queue: Mutex<VecDeque<Pending>>,
    waker: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

/// Single-threaded UI driver hook.
///
/// Background contexts enqueue deliveries; the UI thread drains them by
/// calling [`NotificationDispatcher::process_pending`] once per pass. Cloning
/// yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    inner: Arc<DispatcherInner>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback invoked whenever new work is queued.
    ///
    /// The host UI uses it to schedule its next pass. It may be called from
    /// any thread and must not call back into the dispatcher synchronously.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.inner.waker.lock() = Some(Arc::new(waker));
    }

    /// Queues a closure to run on the next UI pass.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.enqueue(Pending::Run(Box::new(job)));
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.queue.lock().is_empty()
    }

    /// Runs one UI pass and returns the number of deliveries made.
    ///
    /// Work queued while the pass runs is left for the next pass, so a
    /// listener that mutates its model again cannot starve the caller.
    pub fn process_pending(&self) -> usize {
        let batch: Vec<Pending> = self.inner.queue.lock().drain(..).collect();
        let mut delivered = 0;
        for entry in batch {
            match entry {
                Pending::Deliver(notifier) => {
                    if let Some(notifier) = notifier.upgrade() {
                        if notifier.deliver_pending() {
                            delivered += 1;
                        }
                    }
                }
                Pending::Run(job) => {
                    job();
                    delivered += 1;
                }
            }
        }
        delivered
    }

    fn enqueue(&self, entry: Pending) {
        self.inner.queue.lock().push_back(entry);
        let waker = self.inner.waker.lock().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

struct ListenerEntry {
    id: SubscriptionId,
    listener: Weak<dyn ModelListener>,
}

/// Per-model listener set plus dirty flag.
pub(crate) struct Notifier {
    listeners: Mutex<Vec<ListenerEntry>>,
    dirty: AtomicBool,
    dispatcher: NotificationDispatcher,
}

impl Notifier {
    pub(crate) fn new(dispatcher: &NotificationDispatcher) -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
            dispatcher: dispatcher.clone(),
        })
    }

    /// Registers `listener`; returns the existing handle when already present.
    pub(crate) fn subscribe(&self, listener: &Arc<dyn ModelListener>) -> SubscriptionId {
        let target = Arc::as_ptr(listener) as *const ();
        let mut entries = self.listeners.lock();
        entries.retain(|entry| entry.listener.strong_count() > 0);
        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.listener.as_ptr() as *const () == target)
        {
            return existing.id;
        }

        let id = SubscriptionId::new();
        entries.push(ListenerEntry {
            id,
            listener: Arc::downgrade(listener),
        });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|entry| entry.id != id);
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|entry| entry.listener.strong_count() > 0)
            .count()
    }

    pub(crate) fn notify(self: &Arc<Self>, mode: Notify) {
        match mode {
            Notify::None => {}
            Notify::Deferred => {
                if !self.dirty.swap(true, Ordering::AcqRel) {
                    self.dispatcher
                        .enqueue(Pending::Deliver(Arc::downgrade(self)));
                }
            }
            Notify::Immediate => {
                // A queued deferred delivery would repeat this change.
                self.dirty.store(false, Ordering::Release);
                self.deliver();
            }
        }
    }

    fn deliver_pending(&self) -> bool {
        if self.dirty.swap(false, Ordering::AcqRel) {
            self.deliver();
            true
        } else {
            false
        }
    }

    fn deliver(&self) {
        let live: Vec<Arc<dyn ModelListener>> = {
            let mut entries = self.listeners.lock();
            entries.retain(|entry| entry.listener.strong_count() > 0);
            entries
                .iter()
                .filter_map(|entry| entry.listener.upgrade())
                .collect()
        };
        for listener in live {
            listener.model_changed();
        }
    }
}
