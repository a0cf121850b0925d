//! Listener callbacks attached to a process line stream.

use std::sync::Arc;

use super::OutputLine;

/// Receives the lines and the completion of a process line stream.
///
/// Callbacks run on the thread that produced the event, usually a reader
/// task owned by the process driver. A panic inside a callback is caught at
/// the subscription boundary and does not reach other listeners. The crate
/// never logs it, but the process panic hook still runs, so the default hook
/// prints the panic message to stderr; install a quieter hook with
/// [`std::panic::set_hook`] if that matters.
pub trait Listener: Send + Sync + 'static {
    /// Called once per line, in arrival order for each stream.
    fn on_next(&self, line: &OutputLine);

    /// Called at most once, after the last line.
    fn on_completed(&self) {}
}

impl<L: Listener + ?Sized> Listener for Arc<L> {
    fn on_next(&self, line: &OutputLine) {
        (**self).on_next(line);
    }

    fn on_completed(&self) {
        (**self).on_completed();
    }
}

impl<L: Listener + ?Sized> Listener for Box<L> {
    fn on_next(&self, line: &OutputLine) {
        (**self).on_next(line);
    }

    fn on_completed(&self) {
        (**self).on_completed();
    }
}

/// Listener built from a pair of closures.
pub struct FnListener<N, C> {
    next: N,
    completed: C,
}

impl<N, C> Listener for FnListener<N, C>
where
    N: Fn(&OutputLine) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    fn on_next(&self, line: &OutputLine) {
        (self.next)(line);
    }

    fn on_completed(&self) {
        (self.completed)();
    }
}

impl<N, C> std::fmt::Debug for FnListener<N, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

/// Build a listener from an `on_next` and an `on_completed` closure.
#[must_use]
pub fn listener<N, C>(on_next: N, on_completed: C) -> FnListener<N, C>
where
    N: Fn(&OutputLine) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    FnListener {
        next: on_next,
        completed: on_completed,
    }
}

/// Build a listener that only observes lines.
#[must_use]
pub fn on_next<N>(on_next: N) -> FnListener<N, fn()>
where
    N: Fn(&OutputLine) + Send + Sync + 'static,
{
    fn ignore() {}
    listener(on_next, ignore as fn())
}
