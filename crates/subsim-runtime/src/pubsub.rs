//! Callback fan-out with a bounded backlog, shared by the log stream and the
//! traffic bus.
//!
//! Callbacks run with the hub unlocked, so they may subscribe, unsubscribe or
//! publish. Items published from inside a callback are delivered after the
//! current item, in order.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// How a hub buffers items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retention {
    /// Always keep the most recent items; subscribers only see new ones.
    RecentWindow,
    /// Buffer only while nobody listens; the first subscriber drains it.
    UntilSubscribed,
}

struct HubInner<T> {
    capacity: usize,
    retention: Retention,
    backlog: VecDeque<T>,
    subscribers: Vec<(u64, Callback<T>)>,
    next_subscriber: u64,
    dispatching: bool,
    pending: VecDeque<T>,
    /// Ids unsubscribed while their callbacks were out for dispatch.
    detached: Vec<u64>,
}

impl<T> HubInner<T> {
    fn remember(&mut self, item: T) {
        if self.backlog.len() == self.capacity {
            self.backlog.pop_front();
        }
        self.backlog.push_back(item);
    }
}

pub(crate) struct Hub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T: Clone + Send + 'static> Hub<T> {
    pub(crate) fn new(capacity: usize, retention: Retention) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                capacity: capacity.max(1),
                retention,
                backlog: VecDeque::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
                dispatching: false,
                pending: VecDeque::new(),
                detached: Vec::new(),
            })),
        }
    }

    pub(crate) fn publish(&self, item: T) {
        let mut inner = self.inner.lock();
        if inner.dispatching {
            inner.pending.push_back(item);
            return;
        }
        inner.dispatching = true;
        let mut next = Some(item);
        while let Some(item) = next {
            let mut subscribers = std::mem::take(&mut inner.subscribers);
            match inner.retention {
                Retention::RecentWindow => inner.remember(item.clone()),
                Retention::UntilSubscribed if subscribers.is_empty() => {
                    inner.remember(item.clone());
                }
                Retention::UntilSubscribed => {}
            }
            MutexGuard::unlocked(&mut inner, || {
                for (_, callback) in &mut subscribers {
                    callback(&item);
                }
            });
            let detached = std::mem::take(&mut inner.detached);
            subscribers.retain(|(id, _)| !detached.contains(id));
            // Subscribers added during dispatch go after the existing ones.
            let added = std::mem::take(&mut inner.subscribers);
            subscribers.extend(added);
            inner.subscribers = subscribers;
            next = inner.pending.pop_front();
        }
        inner.dispatching = false;
    }

    pub(crate) fn subscribe(&self, mut callback: Callback<T>) -> Subscription {
        let mut inner = self.inner.lock();
        if inner.retention == Retention::UntilSubscribed && !inner.backlog.is_empty() {
            let backlog = std::mem::take(&mut inner.backlog);
            MutexGuard::unlocked(&mut inner, || {
                for item in &backlog {
                    callback(item);
                }
            });
        }
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push((id, callback));
        drop(inner);

        let hub: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription { id, hub }
    }

    pub(crate) fn backlog(&self) -> Vec<T> {
        self.inner.lock().backlog.iter().cloned().collect()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send> Detach for Mutex<HubInner<T>> {
    fn detach(&self, id: u64) {
        let mut inner = self.lock();
        inner.subscribers.retain(|(sub, _)| *sub != id);
        if inner.dispatching {
            inner.detached.push(id);
        }
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving items. Dropping the handle keeps the subscription alive.
pub struct Subscription {
    id: u64,
    hub: Weak<dyn Detach>,
}

impl Subscription {
    /// Removes the callback. Safe to call after the owning engine is gone.
    pub fn unsubscribe(self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
