//! # Settlement guard.
//!
//! [`guard`] is the foundation every stateful variant runs through. It turns a
//! *body* (a function receiving a [`Resolver`] and returning a [`Teardown`]) plus a
//! [`Handlers`] set into a [`Cancel`] handle, and enforces:
//!
//! - **settle once**: the first `succeed`/`fail`/`defect` reaches the handlers, later calls are absorbed;
//! - **close once**: `on_close` runs exactly once on every termination path;
//! - **sever**: on settling, handlers, hooks and the returned [`Cancel`]'s closure are dropped;
//! - **no dangling cancel**: a body that settled before returning gets a no-op handle.
//!
//! ## State machine
//! ```text
//!            succeed / fail / defect
//!   Pending ─────────────────────────► Settled   (handler fires, then on_close)
//!      │
//!      ├───── Cancel::cancel() ──────► Canceled  (on_cancel, then on_close)
//!      │
//!      └── last Resolver dropped ────► Abandoned (handlers dropped; cancel still runs hooks)
//! ```
//!
//! ## Rules
//! - No lock is held while user code runs, so a handler may re-enter the engine
//!   (cancel its own run, settle again) without deadlocking or corrupting state.
//! - A panic in the body is captured and delivered on the defect channel. If the
//!   instance already settled, the panic continues unwinding.
//! - Handlers are dropped outside the instance lock; dropping them may abandon a
//!   parent instance in turn.

use std::fmt;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::cancel::{Cancel, Severer};
use crate::core::handlers::Handlers;
use crate::error::Defect;

/// Global sequence for execution instance ids (log correlation only).
static INSTANCE_SEQ: AtomicU64 = AtomicU64::new(0);

type Hook = Box<dyn FnOnce() + Send>;

/// # What a computation leaves behind for cancellation and cleanup.
///
/// - `on_cancel` runs only when cancellation is requested before settlement.
/// - `on_close` runs on **any** termination path (settlement or cancellation), exactly once.
///
/// Computations may also return `()` (nothing to clean up) or a child [`Cancel`].
///
/// # Example
/// ```
/// use settle::{Task, Teardown};
///
/// let task: Task<u32, String> = Task::create(|resolver| {
///     resolver.succeed(1);
///     Teardown::on_cancel(|| println!("never printed"))
///         .with_on_close(|| println!("closed"))
/// });
/// # let _ = task;
/// ```
#[derive(Default)]
pub enum Teardown {
    /// Nothing to cancel or clean up.
    #[default]
    None,
    /// A plain cancellation operation (treated as `on_cancel`).
    Cancel(Hook),
    /// Explicit cancel and close hooks.
    Hooks {
        /// Runs when cancellation is requested before settlement.
        on_cancel: Option<Hook>,
        /// Runs once on every termination path.
        on_close: Option<Hook>,
    },
}

impl Teardown {
    /// Teardown with only a cancel hook.
    pub fn on_cancel(f: impl FnOnce() + Send + 'static) -> Self {
        Teardown::Cancel(Box::new(f))
    }

    /// Teardown with only a close hook.
    pub fn on_close(f: impl FnOnce() + Send + 'static) -> Self {
        Teardown::Hooks {
            on_cancel: None,
            on_close: Some(Box::new(f)),
        }
    }

    /// Replaces the cancel hook, keeping any close hook.
    pub fn with_on_cancel(self, f: impl FnOnce() + Send + 'static) -> Self {
        let (_, on_close) = self.into_hooks();
        Teardown::Hooks {
            on_cancel: Some(Box::new(f)),
            on_close,
        }
    }

    /// Replaces the close hook, keeping any cancel hook.
    pub fn with_on_close(self, f: impl FnOnce() + Send + 'static) -> Self {
        let (on_cancel, _) = self.into_hooks();
        Teardown::Hooks {
            on_cancel,
            on_close: Some(Box::new(f)),
        }
    }

    fn into_hooks(self) -> (Option<Hook>, Option<Hook>) {
        match self {
            Teardown::None => (None, None),
            Teardown::Cancel(f) => (Some(f), None),
            Teardown::Hooks {
                on_cancel,
                on_close,
            } => (on_cancel, on_close),
        }
    }
}

impl From<()> for Teardown {
    fn from(_: ()) -> Self {
        Teardown::None
    }
}

impl From<Cancel> for Teardown {
    fn from(cancel: Cancel) -> Self {
        Teardown::on_cancel(move || cancel.cancel())
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Teardown::None => f.write_str("Teardown::None"),
            Teardown::Cancel(_) => f.write_str("Teardown::Cancel"),
            Teardown::Hooks {
                on_cancel,
                on_close,
            } => f
                .debug_struct("Teardown::Hooks")
                .field("on_cancel", &on_cancel.is_some())
                .field("on_close", &on_close.is_some())
                .finish(),
        }
    }
}

enum Phase<T, E> {
    Pending(Handlers<T, E>),
    /// Every resolver is gone: nothing can settle any more, so the handlers were
    /// dropped. Hooks stay in place for a later cancel.
    Abandoned,
    Settled,
    Canceled,
}

impl<T, E> Phase<T, E> {
    fn label(&self) -> &'static str {
        match self {
            Phase::Pending(_) => "pending",
            Phase::Abandoned => "abandoned",
            Phase::Settled => "settled",
            Phase::Canceled => "canceled",
        }
    }
}

/// Mutable state of one execution instance.
struct Instance<T, E> {
    id: u64,
    phase: Phase<T, E>,
    on_cancel: Option<Hook>,
    on_close: Option<Hook>,
    handle: Option<Severer>,
}

/// Everything released when an instance reaches a terminal phase.
struct Released<T, E> {
    handlers: Option<Handlers<T, E>>,
    on_cancel: Option<Hook>,
    on_close: Option<Hook>,
    handle: Option<Severer>,
}

impl<T, E> Released<T, E> {
    /// Drops the cancel handle's closure and the cancel hook, returning the rest.
    fn sever(self) -> (Option<Handlers<T, E>>, Option<Hook>) {
        if let Some(handle) = self.handle {
            handle.sever();
        }
        drop(self.on_cancel);
        (self.handlers, self.on_close)
    }
}

type Shared<T, E> = Arc<Mutex<Instance<T, E>>>;

fn lock<T, E>(inner: &Shared<T, E>) -> MutexGuard<'_, Instance<T, E>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Moves a live (`Pending` or `Abandoned`) instance into `next`, returning what it owned.
fn release<T, E>(inner: &Shared<T, E>, next: Phase<T, E>) -> Option<(u64, Released<T, E>)> {
    let mut st = lock(inner);
    if matches!(st.phase, Phase::Settled | Phase::Canceled) {
        return None;
    }
    let handlers = match mem::replace(&mut st.phase, next) {
        Phase::Pending(handlers) => Some(handlers),
        _ => None,
    };
    let released = Released {
        handlers,
        on_cancel: st.on_cancel.take(),
        on_close: st.on_close.take(),
        handle: st.handle.take(),
    };
    Some((st.id, released))
}

/// Drops the handlers of a pending instance nobody can settle any more.
fn abandon<T, E>(inner: &Shared<T, E>) {
    let handlers = {
        let mut st = lock(inner);
        if !matches!(st.phase, Phase::Pending(_)) {
            return;
        }
        tracing::trace!(instance = st.id, "abandoned by every resolver");
        match mem::replace(&mut st.phase, Phase::Abandoned) {
            Phase::Pending(handlers) => Some(handlers),
            _ => None,
        }
    };
    drop(handlers);
}

/// Shared by all clones of one [`Resolver`]; abandons the instance when the last clone goes.
struct Anchor<T, E> {
    shared: Shared<T, E>,
}

impl<T, E> Drop for Anchor<T, E> {
    fn drop(&mut self) {
        abandon(&self.shared);
    }
}

/// # Settlement callbacks handed to a computation.
///
/// Cloneable and `Send`, so it can be moved into timers, spawned tasks or I/O
/// callbacks. Only the first settlement across all clones is observed.
///
/// Dropping every clone without settling abandons the run: its handlers are
/// dropped (an awaiting [`Task::settle`](crate::Task::settle) sees
/// [`SettleError::Canceled`](crate::SettleError::Canceled)) while the cancel
/// handle keeps working.
pub struct Resolver<T, E> {
    inner: Arc<Anchor<T, E>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn shared(&self) -> &Shared<T, E> {
        &self.inner.shared
    }

    /// Settles with a success value.
    pub fn succeed(&self, value: T) {
        match release(self.shared(), Phase::Settled) {
            Some((id, released)) => {
                tracing::trace!(instance = id, "settled with success");
                let (handlers, on_close) = released.sever();
                if let Some(handlers) = handlers {
                    handlers.succeed(value);
                }
                fire(on_close);
            }
            None => self.absorbed("success"),
        }
    }

    /// Settles with a domain failure.
    pub fn fail(&self, error: E) {
        match release(self.shared(), Phase::Settled) {
            Some((id, released)) => {
                tracing::trace!(instance = id, "settled with failure");
                let (handlers, on_close) = released.sever();
                if let Some(handlers) = handlers {
                    handlers.fail(error);
                }
                fire(on_close);
            }
            None => self.absorbed("failure"),
        }
    }

    /// Settles with a defect. A defect arriving after settlement is absorbed.
    pub fn defect(&self, defect: Defect) {
        if let Err(defect) = self.deliver_defect(defect) {
            tracing::debug!(defect = %defect, "late defect absorbed");
        }
    }

    /// Returns `true` while no settlement or cancellation has happened.
    pub fn is_pending(&self) -> bool {
        matches!(lock(self.shared()).phase, Phase::Pending(_))
    }

    /// Handlers forwarding every channel into this resolver.
    pub(crate) fn handlers(&self) -> Handlers<T, E> {
        let (s, f, d) = (self.clone(), self.clone(), self.clone());
        Handlers::from_parts(
            move |value| s.succeed(value),
            move |error| f.fail(error),
            move |defect| d.defect(defect),
        )
    }

    fn deliver_defect(&self, defect: Defect) -> Result<(), Defect> {
        let Some((id, released)) = release(self.shared(), Phase::Settled) else {
            return Err(defect);
        };
        tracing::debug!(instance = id, defect = %defect, "settled with defect");
        let (handlers, on_close) = released.sever();
        if let Some(handlers) = handlers {
            handlers.raise(defect);
        }
        fire(on_close);
        Ok(())
    }

    fn absorbed(&self, channel: &'static str) {
        let st = lock(self.shared());
        tracing::debug!(
            instance = st.id,
            phase = st.phase.label(),
            channel,
            "late settlement absorbed"
        );
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = lock(&self.inner.shared);
        f.debug_struct("Resolver")
            .field("instance", &st.id)
            .field("phase", &st.phase.label())
            .finish()
    }
}

fn fire(hook: Option<Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

fn cancel_instance<T, E>(inner: &Shared<T, E>) {
    let Some((id, released)) = release(inner, Phase::Canceled) else {
        return;
    };
    tracing::trace!(instance = id, "canceled");
    let Released {
        handlers,
        on_cancel,
        on_close,
        handle,
    } = released;
    drop(handle);
    drop(handlers);
    fire(on_cancel);
    fire(on_close);
}

/// Runs `body` under the settle-once / close-once contract and returns its cancel handle.
///
/// ### Flow
/// 1. Create a fresh instance in `Pending` holding `handlers`
/// 2. Invoke `body` with a [`Resolver`]; a panic goes to the defect channel
/// 3. If the instance settled during the body: drop `on_cancel`, run `on_close`, return a no-op handle
/// 4. Otherwise store the hooks and a severing link to a live handle (`on_cancel`, then `on_close`)
/// 5. Once the last resolver is dropped unsettled, the instance is abandoned
pub(crate) fn guard<T, E, B>(body: B, handlers: Handlers<T, E>) -> Cancel
where
    T: Send + 'static,
    E: Send + 'static,
    B: FnOnce(Resolver<T, E>) -> Teardown,
{
    let id = INSTANCE_SEQ.fetch_add(1, AtomicOrdering::Relaxed);
    let inner: Shared<T, E> = Arc::new(Mutex::new(Instance {
        id,
        phase: Phase::Pending(handlers),
        on_cancel: None,
        on_close: None,
        handle: None,
    }));
    let resolver = Resolver {
        inner: Arc::new(Anchor {
            shared: inner.clone(),
        }),
    };
    tracing::trace!(instance = id, "execution started");

    let teardown = match catch_unwind(AssertUnwindSafe(|| body(resolver.clone()))) {
        Ok(teardown) => teardown,
        Err(payload) => {
            let defect = Defect::from_panic(payload);
            if let Err(defect) = resolver.deliver_defect(defect) {
                defect.resume();
            }
            Teardown::None
        }
    };
    let (on_cancel, on_close) = teardown.into_hooks();

    let target = inner.clone();
    let mut st = lock(&inner);
    let cancel = if matches!(st.phase, Phase::Pending(_) | Phase::Abandoned) {
        let cancel = Cancel::new(move || cancel_instance(&target));
        st.on_cancel = on_cancel;
        st.on_close = on_close;
        st.handle = Some(cancel.severer());
        drop(st);
        cancel
    } else {
        drop(st);
        drop(target);
        tracing::trace!(instance = id, "settled before body returned");
        drop(on_cancel);
        fire(on_close);
        Cancel::noop()
    };
    drop(resolver);
    cancel
}
