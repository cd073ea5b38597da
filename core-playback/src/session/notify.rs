//! Selector-based change notification.
//!
//! Each subscriber selects a slice of [`SessionState`] and is called only
//! when that slice compares unequal to the last value it saw. Dispatch runs
//! on the session task after a state change has been published, so every
//! callback sees all fields of one command applied together.

use super::state::SessionState;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

trait Slot: Send {
    fn notify(&mut self, state: &SessionState);
}

struct Selected<T, S, F> {
    selector: S,
    callback: F,
    last: T,
}

impl<T, S, F> Slot for Selected<T, S, F>
where
    T: PartialEq + Send,
    S: Fn(&SessionState) -> T + Send,
    F: FnMut(&T) + Send,
{
    fn notify(&mut self, state: &SessionState) {
        let next = (self.selector)(state);
        if next != self.last {
            self.last = next;
            (self.callback)(&self.last);
        }
    }
}

struct Entry {
    id: u64,
    active: AtomicBool,
    slot: Mutex<Box<dyn Slot>>,
}

#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Mutex<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
}

impl Subscribers {
    /// Registers a subscriber. `current` is read while the registry is
    /// locked so a concurrent dispatch cannot be missed.
    pub(crate) fn subscribe<T, S, F>(
        self: &Arc<Self>,
        current: impl FnOnce() -> SessionState,
        selector: S,
        callback: F,
    ) -> Subscription
    where
        T: PartialEq + Send + 'static,
        S: Fn(&SessionState) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        let last = selector(&current());
        entries.push(Arc::new(Entry {
            id,
            active: AtomicBool::new(true),
            slot: Mutex::new(Box::new(Selected {
                selector,
                callback,
                last,
            })),
        }));

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn notify(&self, state: &SessionState) {
        let entries = self.entries.lock().clone();
        for entry in entries {
            if entry.active.load(Ordering::Acquire) {
                entry.slot.lock().notify(state);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn remove(&self, id: u64) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries.iter().position(|entry| entry.id == id) {
            let entry = entries.swap_remove(index);
            entry.active.store(false, Ordering::Release);
        }
    }
}

/// Keeps a subscriber registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Subscribers>,
}

impl Subscription {
    /// Stops notifications. A dispatch already running may still complete.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
