//! # Cancellation handles.
//!
//! [`Cancel`] is what every [`Task::run`](crate::Task::run) returns: a
//! no-argument, idempotent operation that aborts one execution instance.
//!
//! [`CancelScope`] is the engine-internal collection combinators use to track
//! the handles of their in-flight children (`chain`, `all`, `race`).
//!
//! ## Rules
//! - A handle fires its closure **at most once**, no matter how many clones call it.
//! - The closure is dropped when it fires, releasing everything it captured.
//! - A closed scope cancels late arrivals immediately instead of keeping them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type CancelFn = Box<dyn FnOnce() + Send>;

/// # Handle that aborts one execution instance.
///
/// Cloning is cheap; all clones share the same one-shot closure.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use settle::Cancel;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = hits.clone();
/// let cancel = Cancel::new(move || { h.fetch_add(1, Ordering::SeqCst); });
///
/// cancel.cancel();
/// cancel.clone().cancel();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// assert!(cancel.is_spent());
/// ```
#[derive(Clone, Default)]
pub struct Cancel {
    slot: Option<Arc<Mutex<Option<CancelFn>>>>,
}

impl Cancel {
    /// A handle that does nothing (already settled, or nothing to cancel).
    pub fn noop() -> Self {
        Self { slot: None }
    }

    /// Wraps a cancellation closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            slot: Some(Arc::new(Mutex::new(Some(Box::new(f))))),
        }
    }

    /// Requests cancellation. Only the first call on any clone has an effect.
    pub fn cancel(&self) {
        let Some(slot) = &self.slot else {
            return;
        };
        let f = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(f) = f {
            f();
        }
    }

    /// Returns `true` if calling [`cancel`](Cancel::cancel) would do nothing.
    pub fn is_spent(&self) -> bool {
        match &self.slot {
            None => true,
            Some(slot) => slot.lock().unwrap_or_else(PoisonError::into_inner).is_none(),
        }
    }

    /// A weak link that can drop this handle's closure without running it.
    pub(crate) fn severer(&self) -> Severer {
        Severer(self.slot.as_ref().map(Arc::downgrade))
    }
}

/// Drops a [`Cancel`] closure once the instance it targets has settled.
///
/// Holds the slot weakly so an instance does not keep its own handle alive.
pub(crate) struct Severer(Option<Weak<Mutex<Option<CancelFn>>>>);

impl Severer {
    pub(crate) fn sever(self) {
        let Some(slot) = self.0.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let f = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(f);
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Children handles owned by one combinator execution.
#[derive(Default)]
struct ScopeState {
    handles: Vec<Cancel>,
    closed: bool,
}

/// Shared set of child cancellation handles.
///
/// Combinators push the handle of every child they start; `cancel_all` closes the
/// scope and cancels everything in it. A handle pushed after the scope closed is
/// canceled on the spot, which covers a child produced while cancellation (or a
/// winning sibling) was already in progress.
#[derive(Clone, Default)]
pub(crate) struct CancelScope {
    inner: Arc<Mutex<ScopeState>>,
}

impl CancelScope {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScopeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks a child handle, or cancels it right away if the scope is closed.
    pub(crate) fn push(&self, handle: Cancel) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            handle.cancel();
        } else {
            state.handles.push(handle);
        }
    }

    /// Closes the scope and cancels every tracked child, in start order.
    pub(crate) fn cancel_all(&self) {
        let handles = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            handle.cancel();
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().handles.len()
    }
}
