//! A single listener's revocable membership in a subscriber registry.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::registry::RegistryInner;
use super::{Listener, OutputLine};

pub(crate) struct SubscriptionInner {
    id: u64,
    registry: Weak<RegistryInner>,
    listener: Box<dyn Listener>,
    disposed: AtomicBool,
    completed: AtomicBool,
}

/// Handle to a subscription on a process line stream.
///
/// Cloning yields another handle to the same subscription. Disposing is
/// idempotent and safe to race with delivery; after it is observed, no
/// further lines reach the listener. Dropping a handle does not unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    inner: Option<Arc<SubscriptionInner>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: Weak<RegistryInner>, listener: Box<dyn Listener>) -> Self {
        Self {
            inner: Some(Arc::new(SubscriptionInner {
                id,
                registry,
                listener,
                disposed: AtomicBool::new(false),
                completed: AtomicBool::new(false),
            })),
        }
    }

    /// A handle bound to nothing: it never delivers and disposing it does nothing.
    #[must_use]
    pub const fn inert() -> Self {
        Self { inner: None }
    }

    /// True for handles returned by an inert fork.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.inner.is_none()
    }

    /// True while the listener can still receive events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| !inner.disposed.load(Ordering::SeqCst))
    }

    pub(crate) fn id(&self) -> Option<u64> {
        self.inner.as_ref().map(|inner| inner.id)
    }

    /// Forward a line. Listener panics are swallowed.
    pub(crate) fn deliver_next(&self, line: &OutputLine) {
        let Some(inner) = &self.inner else { return };
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        let _ = catch_unwind(AssertUnwindSafe(|| inner.listener.on_next(line)));
    }

    /// Forward completion at most once, then leave the registry.
    pub(crate) fn deliver_completed(&self) {
        let Some(inner) = &self.inner else { return };
        if inner.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !inner.disposed.load(Ordering::SeqCst) {
            let _ = catch_unwind(AssertUnwindSafe(|| inner.listener.on_completed()));
        }
        self.dispose();
    }

    /// Mark disposed without touching the registry. Returns true on the first call.
    pub(crate) fn mark_disposed(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| !inner.disposed.swap(true, Ordering::SeqCst))
    }

    /// Unsubscribe. Only the first call, from any thread, has an effect.
    pub fn dispose(&self) {
        let Some(inner) = &self.inner else { return };
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = inner.registry.upgrade() {
            registry.remove_id(inner.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Subscription")
                .field("id", &inner.id)
                .field("disposed", &inner.disposed.load(Ordering::SeqCst))
                .field("completed", &inner.completed.load(Ordering::SeqCst))
                .finish(),
            None => f.write_str("Subscription(inert)"),
        }
    }
}
