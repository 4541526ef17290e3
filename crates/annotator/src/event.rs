//! Typed events and explicit subscription lists.

use annotation_model::ThreadId;
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEvent {
    /// First annotation stored; the thread now carries its canonical id.
    Created { previous_id: ThreadId, thread_id: ThreadId, page: u32 },
    /// Annotations changed on a persisted thread.
    Updated { thread_id: ThreadId },
    /// Last annotation deleted; the owner must unindex the thread.
    Deleted { thread_id: ThreadId, page: u32 },
    SaveFailed { thread_id: ThreadId, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotatorEvent {
    PointModeEnter,
    PointModeExit,
    ThreadDeleted { thread_id: ThreadId, page: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

/// Ordered list of listeners for one event type.
///
/// Listeners run without any internal borrow held, so they may subscribe or
/// unsubscribe listeners while an event is being delivered. A listener
/// unsubscribed mid-emission does not see the rest of that event.
pub struct EventBus<E> {
    listeners: RefCell<Vec<(SubscriptionId, Listener<E>)>>,
    next_id: Cell<u64>,
    cleared: Cell<u64>,
    /// Ids of listeners taken out by emissions still on the stack.
    running: RefCell<Vec<SubscriptionId>>,
    /// Running listeners unsubscribed before their emission finished.
    removed: RefCell<Vec<SubscriptionId>>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            cleared: Cell::new(0),
            running: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the subscription was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        if listeners.len() != before {
            return true;
        }
        drop(listeners);

        let detached = self.running.borrow().contains(&id) && !self.removed.borrow().contains(&id);
        if detached {
            self.removed.borrow_mut().push(id);
        }
        detached
    }

    /// Drop every listener, including ones running in the current emission.
    pub fn clear(&self) {
        self.cleared.set(self.cleared.get() + 1);
        self.listeners.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn emit(&self, event: &E) {
        let generation = self.cleared.get();
        let mut running = std::mem::take(&mut *self.listeners.borrow_mut());
        let depth = self.running.borrow().len();
        self.running.borrow_mut().extend(running.iter().map(|(id, _)| *id));
        for (id, listener) in running.iter_mut() {
            if self.removed.borrow().contains(id) {
                continue;
            }
            listener(event);
        }
        self.running.borrow_mut().truncate(depth);

        let unsubscribed: Vec<SubscriptionId> = {
            let mut removed = self.removed.borrow_mut();
            let (ours, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *removed)
                .into_iter()
                .partition(|id| running.iter().any(|(existing, _)| existing == id));
            *removed = rest;
            ours
        };
        running.retain(|(id, _)| !unsubscribed.contains(id));
        if self.cleared.get() != generation {
            return;
        }

        // listeners added during emission go after the existing ones
        let mut listeners = self.listeners.borrow_mut();
        let added = std::mem::take(&mut *listeners);
        *listeners = running;
        listeners.extend(added);
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.len()).finish()
    }
}
