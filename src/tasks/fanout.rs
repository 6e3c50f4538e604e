//! # Fan-out stages: join (`all`) and select (`race`).
//!
//! Both start every child immediately, one after another, without waiting for
//! any of them to settle. Child cancel handles go into a shared [`CancelScope`].
//!
//! ```text
//! all:   child[0] ─┐
//!        child[1] ─┼─► results[i] ─► (remaining == 0) ─► success(Vec in input order)
//!        child[n] ─┘      └─ first failure ─► failure(e) + cancel siblings
//!
//! race:  child[0] ─┐
//!        child[1] ─┼─► first settlement wins ─► outer handlers + cancel losers
//!        child[n] ─┘
//! ```
//!
//! ## Rules
//! - `all([])` succeeds with an empty `Vec` without starting anything.
//! - `race([])` never settles.
//! - A child started after the outcome is already decided (it settled
//!   synchronously while the loop was still running) is canceled on the spot.
//! - Siblings are canceled before the outcome is delivered, so a raising
//!   outer handler cannot leave them running.

use std::sync::{Arc, Mutex, PoisonError};

use crate::core::{Cancel, CancelScope, Handlers, Teardown, guard};
use crate::tasks::task::{Stage, Task, Value};

/// Per-run join state: one slot per child, plus the count still outstanding.
struct Join<T> {
    results: Vec<Option<T>>,
    remaining: usize,
}

impl<T> Join<T> {
    fn new(len: usize) -> Self {
        Self {
            results: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    /// Records the value for `index`; returns the ordered results once all are in.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        if let Some(slot) = self.results.get_mut(index) {
            if slot.replace(value).is_none() {
                self.remaining -= 1;
            }
        }
        if self.remaining == 0 {
            Some(self.results.drain(..).flatten().collect())
        } else {
            None
        }
    }
}

pub(crate) struct AllStage<T, E> {
    tasks: Vec<Task<T, E>>,
}

impl<T, E> AllStage<T, E> {
    pub(crate) fn new(tasks: Vec<Task<T, E>>) -> Self {
        Self { tasks }
    }
}

impl<T: Value, E: Value> Stage<Vec<T>, E> for AllStage<T, E> {
    fn run(&self, handlers: Handlers<Vec<T>, E>) -> Cancel {
        if self.tasks.is_empty() {
            handlers.succeed(Vec::new());
            return Cancel::noop();
        }
        let tasks = self.tasks.clone();
        guard(
            move |resolver| {
                let join = Arc::new(Mutex::new(Join::new(tasks.len())));
                let scope = CancelScope::new();

                for (index, task) in tasks.iter().enumerate() {
                    let join = join.clone();
                    let (on_success, on_failure, on_defect) =
                        (resolver.clone(), resolver.clone(), resolver.clone());
                    let (failure_scope, defect_scope) = (scope.clone(), scope.clone());

                    let cancel = task.run(Handlers::from_parts(
                        move |value| {
                            let done = join
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .fill(index, value);
                            if let Some(values) = done {
                                on_success.succeed(values);
                            }
                        },
                        move |error| {
                            failure_scope.cancel_all();
                            on_failure.fail(error);
                        },
                        move |defect| {
                            defect_scope.cancel_all();
                            on_defect.defect(defect);
                        },
                    ));
                    scope.push(cancel);
                }

                Teardown::on_cancel(move || scope.cancel_all())
            },
            handlers,
        )
    }
}

/// Runs `tasks` against one shared guarded handler set; first settlement wins.
pub(crate) fn race<T: Value, E: Value>(tasks: &[Task<T, E>], handlers: Handlers<T, E>) -> Cancel {
    if tasks.is_empty() {
        drop(handlers);
        return Cancel::noop();
    }
    let tasks = tasks.to_vec();
    guard(
        move |resolver| {
            let scope = CancelScope::new();

            for task in &tasks {
                let (on_success, on_failure, on_defect) =
                    (resolver.clone(), resolver.clone(), resolver.clone());
                let (success_scope, failure_scope, defect_scope) =
                    (scope.clone(), scope.clone(), scope.clone());

                let cancel = task.run(Handlers::from_parts(
                    move |value| {
                        success_scope.cancel_all();
                        on_success.succeed(value);
                    },
                    move |error| {
                        failure_scope.cancel_all();
                        on_failure.fail(error);
                    },
                    move |defect| {
                        defect_scope.cancel_all();
                        on_defect.defect(defect);
                    },
                ));
                scope.push(cancel);
            }

            Teardown::on_cancel(move || scope.cancel_all())
        },
        handlers,
    )
}
