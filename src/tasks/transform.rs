//! # Unary and sequencing stages.
//!
//! - [`MapStage`] / [`MapRejectedStage`]: rewrite one channel on the way out; no
//!   state of their own, cancellation is the child's handle.
//! - [`ChainStage`] / [`OrElseStage`]: run a first task, then a second one built
//!   from its outcome; one settlement guard spans both, and one [`CancelScope`]
//!   holds both cancel handles.
//!
//! ```text
//! chain:   first ──success(x)──► f(x) ──► second ──► outer handlers
//!            └──failure(e)────────────────────────► outer failure
//!
//! or_else: first ──failure(e)──► f(e) ──► second ──► outer handlers
//!            └──success(x)────────────────────────► outer success
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::core::{Cancel, CancelScope, Handlers, Teardown, guard};
use crate::error::Defect;
use crate::tasks::task::{Stage, Task, Value};

pub(crate) struct MapStage<S, E, F> {
    source: Task<S, E>,
    f: Arc<F>,
}

impl<S, E, F> MapStage<S, E, F> {
    pub(crate) fn new(source: Task<S, E>, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
        }
    }
}

impl<S, T, E, F> Stage<T, E> for MapStage<S, E, F>
where
    S: Value,
    T: Value,
    E: Value,
    F: Fn(S) -> T + Send + Sync + 'static,
{
    fn run(&self, handlers: Handlers<T, E>) -> Cancel {
        let f = self.f.clone();
        let (success, failure, defect) = handlers.into_parts();
        self.source.run(Handlers::from_parts(
            move |value| success(f(value)),
            failure,
            defect,
        ))
    }
}

pub(crate) struct MapRejectedStage<T, E, F> {
    source: Task<T, E>,
    f: Arc<F>,
}

impl<T, E, F> MapRejectedStage<T, E, F> {
    pub(crate) fn new(source: Task<T, E>, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
        }
    }
}

impl<T, E, E2, F> Stage<T, E2> for MapRejectedStage<T, E, F>
where
    T: Value,
    E: Value,
    E2: Value,
    F: Fn(E) -> E2 + Send + Sync + 'static,
{
    fn run(&self, handlers: Handlers<T, E2>) -> Cancel {
        let f = self.f.clone();
        let (success, failure, defect) = handlers.into_parts();
        self.source.run(Handlers::from_parts(
            success,
            move |error| failure(f(error)),
            defect,
        ))
    }
}

pub(crate) struct ChainStage<S, E, F> {
    source: Task<S, E>,
    f: Arc<F>,
}

impl<S, E, F> ChainStage<S, E, F> {
    pub(crate) fn new(source: Task<S, E>, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
        }
    }
}

impl<S, T, E, F> Stage<T, E> for ChainStage<S, E, F>
where
    S: Value,
    T: Value,
    E: Value,
    F: Fn(S) -> Task<T, E> + Send + Sync + 'static,
{
    fn run(&self, handlers: Handlers<T, E>) -> Cancel {
        let source = self.source.clone();
        let f = self.f.clone();
        guard(
            move |resolver| {
                let scope = CancelScope::new();
                let (next_scope, on_success, on_failure, on_defect) = (
                    scope.clone(),
                    resolver.clone(),
                    resolver.clone(),
                    resolver,
                );
                let first = source.run(Handlers::from_parts(
                    move |value| match catch_unwind(AssertUnwindSafe(|| f(value))) {
                        Ok(next) => next_scope.push(next.run(on_success.handlers())),
                        Err(payload) => on_success.defect(Defect::from_panic(payload)),
                    },
                    move |error| on_failure.fail(error),
                    move |defect| on_defect.defect(defect),
                ));
                scope.push(first);
                Teardown::on_cancel(move || scope.cancel_all())
            },
            handlers,
        )
    }
}

pub(crate) struct OrElseStage<T, E, F> {
    source: Task<T, E>,
    f: Arc<F>,
}

impl<T, E, F> OrElseStage<T, E, F> {
    pub(crate) fn new(source: Task<T, E>, f: F) -> Self {
        Self {
            source,
            f: Arc::new(f),
        }
    }
}

impl<T, E, E2, F> Stage<T, E2> for OrElseStage<T, E, F>
where
    T: Value,
    E: Value,
    E2: Value,
    F: Fn(E) -> Task<T, E2> + Send + Sync + 'static,
{
    fn run(&self, handlers: Handlers<T, E2>) -> Cancel {
        let source = self.source.clone();
        let f = self.f.clone();
        guard(
            move |resolver| {
                let scope = CancelScope::new();
                let (next_scope, on_success, on_failure, on_defect) = (
                    scope.clone(),
                    resolver.clone(),
                    resolver.clone(),
                    resolver,
                );
                let first = source.run(Handlers::from_parts(
                    move |value| on_success.succeed(value),
                    move |error| next_scope.push(f(error).run(on_failure.handlers())),
                    move |defect| on_defect.defect(defect),
                ));
                scope.push(first);
                Teardown::on_cancel(move || scope.cancel_all())
            },
            handlers,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::core::Resolver;

    use super::*;

    type Seen = Arc<Mutex<Vec<String>>>;

    fn record(task: &Task<u32, String>) -> (Seen, Cancel) {
        let seen: Seen = Arc::default();
        let (s, f, d) = (seen.clone(), seen.clone(), seen.clone());
        let cancel = task.run(Handlers::from_parts(
            move |v| s.lock().unwrap().push(format!("ok {v}")),
            move |e| f.lock().unwrap().push(format!("err {e}")),
            move |x| d.lock().unwrap().push(format!("defect {}", x.message())),
        ));
        (seen, cancel)
    }

    /// A leaf that parks its resolver and counts cancellations.
    fn parked(
        slot: &Arc<Mutex<Option<Resolver<u32, String>>>>,
        canceled: &Arc<AtomicUsize>,
    ) -> Task<u32, String> {
        let (slot, canceled) = (slot.clone(), canceled.clone());
        Task::create(move |r| {
            *slot.lock().unwrap() = Some(r);
            let c = canceled.clone();
            Teardown::on_cancel(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn chain_sequences_and_skips_continuation_on_failure() {
        let ok: Task<u32, String> = Task::of(2).chain(|x| Task::of(x + 1));
        assert_eq!(*record(&ok).0.lock().unwrap(), vec!["ok 3"]);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let failed: Task<u32, String> = Task::rejected("first".to_string()).chain(move |x: u32| {
            c.fetch_add(1, Ordering::SeqCst);
            Task::of(x)
        });
        assert_eq!(*record(&failed).0.lock().unwrap(), vec!["err first"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn chain_continuation_panic_becomes_defect() {
        let task: Task<u32, String> = Task::of(1).chain(|_x: u32| -> Task<u32, String> {
            panic!("continuation broke")
        });
        assert_eq!(
            *record(&task).0.lock().unwrap(),
            vec!["defect continuation broke"]
        );
    }

    #[test]
    fn chain_cancel_reaches_first_task() {
        let slot = Arc::default();
        let canceled = Arc::new(AtomicUsize::new(0));
        let task = parked(&slot, &canceled).chain(|x| Task::of(x));

        let (seen, cancel) = record(&task);
        cancel.cancel();
        assert_eq!(canceled.load(Ordering::SeqCst), 1);

        slot.lock().unwrap().take().unwrap().succeed(1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn chain_cancel_reaches_second_task() {
        let first_slot: Arc<Mutex<Option<Resolver<u32, String>>>> = Arc::default();
        let second_slot = Arc::default();
        let first_canceled = Arc::new(AtomicUsize::new(0));
        let second_canceled = Arc::new(AtomicUsize::new(0));

        let second = parked(&second_slot, &second_canceled);
        let task = parked(&first_slot, &first_canceled).chain(move |_x| second.clone());

        let (seen, cancel) = record(&task);
        first_slot.lock().unwrap().take().unwrap().succeed(1);
        assert!(second_slot.lock().unwrap().is_some());

        cancel.cancel();
        assert_eq!(first_canceled.load(Ordering::SeqCst), 0);
        assert_eq!(second_canceled.load(Ordering::SeqCst), 1);

        second_slot.lock().unwrap().take().unwrap().succeed(2);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn or_else_recovers_and_passes_success_through() {
        let recovered: Task<u32, String> =
            Task::rejected("e".to_string()).or_else(|e: String| Task::of(e.len() as u32));
        assert_eq!(*record(&recovered).0.lock().unwrap(), vec!["ok 1"]);

        let untouched: Task<u32, String> = Task::of(5).or_else(|_e: String| Task::of(0));
        assert_eq!(*record(&untouched).0.lock().unwrap(), vec!["ok 5"]);

        let refailed: Task<u32, String> =
            Task::rejected("a".to_string()).or_else(|e: String| Task::rejected(format!("{e}b")));
        assert_eq!(*record(&refailed).0.lock().unwrap(), vec!["err ab"]);
    }

    #[test]
    fn or_else_cancel_reaches_recovery_task() {
        let first_slot: Arc<Mutex<Option<Resolver<u32, String>>>> = Arc::default();
        let second_slot = Arc::default();
        let canceled = Arc::new(AtomicUsize::new(0));
        let recovery = parked(&second_slot, &canceled);
        let task = parked(&first_slot, &Arc::new(AtomicUsize::new(0)))
            .or_else(move |_e: String| recovery.clone());

        let (seen, cancel) = record(&task);
        first_slot.lock().unwrap().take().unwrap().fail("x".into());
        cancel.cancel();
        assert_eq!(canceled.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap().is_empty());
    }
}
