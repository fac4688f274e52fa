//! SubscriptionHub - ordered fan-out of session snapshots
//!
//! Two ways to listen:
//! - `subscribe(callback)` → `Subscription` (synchronous, called in emission order)
//! - `watch()` → unbounded mpsc receiver (async consumers)
//!
//! Dispatch iterates a copy of the listener list, so callbacks may subscribe
//! or unsubscribe (themselves or others) mid-round. A snapshot emitted from
//! inside a callback is queued behind the current round.

use crate::core::session::SessionState;
use futures::channel::mpsc;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Listener = Rc<dyn Fn(&SessionState)>;

#[derive(Default)]
struct HubInner {
    listeners: Vec<(u64, Listener)>,
    watchers: Vec<mpsc::UnboundedSender<SessionState>>,
    next_id: u64,
    dispatching: bool,
    queue: VecDeque<SessionState>,
}

/// Observer registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Rc<RefCell<HubInner>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every future snapshot
    pub fn subscribe(&self, callback: impl Fn(&SessionState) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.listeners.push((id, Rc::new(callback)));
        Subscription {
            hub: Rc::downgrade(&self.inner),
            id,
            active: Cell::new(true),
        }
    }

    /// Stream of future snapshots; dropping the receiver unregisters it
    pub fn watch(&self) -> mpsc::UnboundedReceiver<SessionState> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.borrow_mut().watchers.push(tx);
        rx
    }

    /// Live callback subscriptions
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `snapshot` to every listener, after anything already queued
    pub fn notify(&self, snapshot: SessionState) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.queue.push_back(snapshot);
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }
        let _round = DispatchGuard(&self.inner);
        loop {
            let next = self.inner.borrow_mut().queue.pop_front();
            let Some(snapshot) = next else { break };
            self.dispatch(&snapshot);
        }
    }

    fn dispatch(&self, snapshot: &SessionState) {
        let listeners: Vec<(u64, Listener)> = self.inner.borrow().listeners.clone();
        for (id, callback) in listeners {
            let live = self.inner.borrow().listeners.iter().any(|(existing, _)| *existing == id);
            if live {
                callback(snapshot);
            }
        }
        self.inner
            .borrow_mut()
            .watchers
            .retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
    }
}

/// Clears the dispatching flag even if a callback panics
struct DispatchGuard<'a>(&'a Rc<RefCell<HubInner>>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.borrow_mut();
        inner.dispatching = false;
        inner.queue.clear();
    }
}

/// Handle returned by `subscribe`. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    hub: Weak<RefCell<HubInner>>,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    /// Stop receiving snapshots. Idempotent; safe inside a callback.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(inner) = self.hub.upgrade() {
            inner.borrow_mut().listeners.retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
