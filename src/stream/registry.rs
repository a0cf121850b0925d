//! Concurrent set of active subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Listener, OutputLine, Subscription};

#[derive(Default)]
pub(crate) struct RegistryInner {
    next_id: AtomicU64,
    members: Mutex<HashMap<u64, Subscription>>,
}

impl RegistryInner {
    fn members(&self) -> MutexGuard<'_, HashMap<u64, Subscription>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove_id(&self, id: u64) {
        self.members().remove(&id);
    }
}

/// The set of listeners currently attached to one process.
///
/// Broadcasts iterate a snapshot, so the lock is never held while a
/// listener runs. A subscription added during a broadcast does not see the
/// line being dispatched, and one disposed during it stops receiving as
/// soon as the disposal is observed.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its handle.
    pub fn add(&self, listener: impl Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription::new(id, Arc::downgrade(&self.inner), Box::new(listener));
        self.inner.members().insert(id, subscription.clone());
        subscription
    }

    /// Remove a subscription. Removing one that is already gone is a no-op.
    pub fn remove(&self, subscription: &Subscription) {
        subscription.mark_disposed();
        if let Some(id) = subscription.id() {
            self.inner.remove_id(id);
        }
    }

    /// The members at this moment.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.inner.members().values().cloned().collect()
    }

    /// Deliver a line to every current member.
    pub fn broadcast(&self, line: &OutputLine) {
        for subscription in self.snapshot() {
            subscription.deliver_next(line);
        }
    }

    /// Deliver completion to every current member.
    ///
    /// Members are taken out of the registry before any listener runs, so a
    /// concurrent [`clear`](Self::clear) cannot cancel a completion that is
    /// already claimed.
    pub fn complete_all(&self) {
        for subscription in self.drain() {
            subscription.deliver_completed();
        }
    }

    /// Drop every member without notifying it.
    pub fn clear(&self) {
        for subscription in self.drain() {
            subscription.mark_disposed();
        }
    }

    fn drain(&self) -> Vec<Subscription> {
        self.inner.members().drain().map(|(_, s)| s).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members().is_empty()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish()
    }
}
