//! # Futures in, futures out.
//!
//! - [`Task::from_future`]: a leaf that spawns a fresh future per run. Panics
//!   inside the future are isolated with `catch_unwind` and reported as defects.
//! - [`Task::settle`] / `IntoFuture`: await a task. The run is canceled if the
//!   returned future is dropped before the task settles.
//!
//! ## Outcome mapping
//! ```text
//! success(v)   ─► Ok(v)
//! failure(e)   ─► Err(SettleError::Failed(e))
//! defect(d)    ─► Err(SettleError::Defect(d))
//! handlers dropped without settling           ─► Err(SettleError::Canceled)
//! ```
//!
//! Handlers are dropped without settling when the run is canceled, or when no
//! resolver is left anywhere in the tree that could still settle it (`empty`,
//! `race([])`, or any combinator whose pending children are all like that).
//! A leaf that keeps its resolver alive keeps the future pending.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::{Cancel, Handlers, Resolver, Teardown};
use crate::error::{Defect, SettleError};
use crate::runtime::current_handle;
use crate::tasks::{Task, Value};

type Outcome<T, E> = Result<T, SettleError<E>>;
type Reply<T, E> = Arc<Mutex<Option<oneshot::Sender<Outcome<T, E>>>>>;

/// Cancels the wrapped run when dropped.
struct CancelOnDrop(Cancel);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn reply<T, E: fmt::Debug>(tx: &Reply<T, E>, outcome: Outcome<T, E>) {
    let tx = tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(tx) = tx {
        let _ = tx.send(outcome);
    }
}

impl<T: Value, E: Value> Task<T, E> {
    /// Wraps a future factory as a leaf task.
    ///
    /// `factory` is called once per run; the future it returns is spawned on the
    /// current tokio runtime. Cancellation stops the spawned future at its next
    /// await point.
    ///
    /// # Example
    /// ```
    /// use settle::Task;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let task: Task<u32, String> = Task::from_future(|| async { Ok(40 + 2) });
    /// assert_eq!(task.await.unwrap(), 42);
    /// # }
    /// ```
    pub fn from_future<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Task::create(move |resolver: Resolver<T, E>| {
            let Some(handle) = current_handle(&resolver, "from_future") else {
                return Teardown::None;
            };
            let token = CancellationToken::new();
            let child = token.clone();
            let fut = factory();

            handle.spawn(async move {
                tokio::select! {
                    _ = child.cancelled() => {}
                    outcome = AssertUnwindSafe(fut).catch_unwind() => match outcome {
                        Ok(Ok(value)) => resolver.succeed(value),
                        Ok(Err(error)) => resolver.fail(error),
                        Err(payload) => resolver.defect(Defect::from_panic(payload)),
                    },
                }
            });
            Teardown::on_close(move || token.cancel())
        })
    }

    /// Runs the task and waits for its outcome.
    ///
    /// Dropping the returned future cancels the run.
    pub async fn settle(&self) -> Outcome<T, E>
    where
        E: fmt::Debug,
    {
        let (tx, rx) = oneshot::channel();
        let tx: Reply<T, E> = Arc::new(Mutex::new(Some(tx)));
        let (s, f, d) = (tx.clone(), tx.clone(), tx);

        let cancel = self.run(Handlers::from_parts(
            move |value| reply(&s, Ok(value)),
            move |error| reply(&f, Err(SettleError::Failed(error))),
            move |defect| reply(&d, Err(SettleError::Defect(defect))),
        ));
        let _cancel_on_drop = CancelOnDrop(cancel);

        rx.await.unwrap_or(Err(SettleError::Canceled))
    }
}

impl<T: Value, E: Value + fmt::Debug> IntoFuture for Task<T, E> {
    type Output = Outcome<T, E>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.settle().await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    #[tokio::test]
    async fn settle_maps_every_outcome() {
        let ok: Task<u32, String> = Task::of(1);
        assert_eq!(ok.settle().await.unwrap(), 1);

        let failed: Task<u32, String> = Task::rejected("no".into());
        assert_eq!(failed.settle().await.unwrap_err().as_label(), "task_failed");

        let defect: Task<u32, String> =
            Task::of(1).chain(|_x: u32| -> Task<u32, String> { panic!("bad continuation") });
        match defect.settle().await {
            Err(SettleError::Defect(d)) => assert_eq!(d.message(), "bad continuation"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let empty: Task<u32, String> = Task::empty();
        assert!(matches!(empty.settle().await, Err(SettleError::Canceled)));
    }

    #[tokio::test]
    async fn unsettleable_trees_resolve_canceled_whatever_their_shape() {
        let empty: Task<u32, String> = Task::empty();
        let dropped: Task<u32, String> = Task::create(|_r: Resolver<u32, String>| ());
        let shapes: Vec<Task<u32, String>> = vec![
            empty.chain(|x| Task::of(x + 1)),
            empty.or_else(|_e: String| Task::of(0)),
            Task::all([empty.clone(), Task::of(1)]).map(|v| v.len() as u32),
            Task::race(Vec::new()),
            empty.concat(&dropped),
            dropped.map(|x| x * 2),
        ];
        for task in shapes {
            let outcome = tokio::time::timeout(Duration::from_secs(1), task.settle()).await;
            assert!(
                matches!(outcome, Ok(Err(SettleError::Canceled))),
                "{task:?} did not resolve as canceled"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn from_future_runs_fresh_future_per_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let task: Task<usize, String> = Task::from_future(move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                sleep(Duration::from_millis(5)).await;
                Ok(n)
            }
        });

        assert_eq!(task.settle().await.unwrap(), 1);
        assert_eq!(task.clone().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn from_future_panic_becomes_defect() {
        let task: Task<u32, String> = Task::from_future(|| async {
            if true {
                panic!("future exploded");
            }
            Ok(0)
        });
        match task.settle().await {
            Err(SettleError::Defect(d)) => assert_eq!(d.message(), "future exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_settle_future_cancels_the_run() {
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let task: Task<u32, String> = Task::from_future(move || {
            let f = f.clone();
            async move {
                sleep(Duration::from_millis(100)).await;
                f.store(true, Ordering::SeqCst);
                Ok(1)
            }
        });

        let settled = tokio::time::timeout(Duration::from_millis(10), task.settle()).await;
        assert!(settled.is_err());

        sleep(Duration::from_millis(200)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
