//! # Timer leaves.
//!
//! [`after`] and [`after_rejected`] settle once a delay has elapsed. Each run
//! spawns one tokio task that waits on `sleep(delay)` or on a
//! [`CancellationToken`], whichever comes first; the token is cancelled on every
//! termination path, so a canceled timer stops immediately.
//!
//! There is no separate timeout primitive in the engine: [`Task::timeout`] is a
//! race between the task and an [`after_rejected`] timer.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{Resolver, Teardown};
use crate::runtime::current_handle;
use crate::tasks::{Task, Value};

fn delayed<T, E, S>(delay: Duration, settle: S) -> Task<T, E>
where
    T: Value,
    E: Value,
    S: Fn(&Resolver<T, E>) + Send + Sync + 'static,
{
    let settle = Arc::new(settle);
    Task::create(move |resolver: Resolver<T, E>| {
        let Some(handle) = current_handle(&resolver, "timer") else {
            return Teardown::None;
        };
        let token = CancellationToken::new();
        let child = token.clone();
        let settle = settle.clone();

        handle.spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => settle(&resolver),
            }
        });
        Teardown::on_close(move || token.cancel())
    })
}

/// A task that succeeds with `value` after `delay`.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use settle::{Task, runtime};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fast: Task<&str, String> = runtime::after(Duration::from_millis(1), "fast");
/// let slow = runtime::after(Duration::from_secs(60), "slow");
/// assert_eq!(fast.concat(&slow).await.unwrap(), "fast");
/// # }
/// ```
pub fn after<T: Value, E: Value>(delay: Duration, value: T) -> Task<T, E> {
    delayed(delay, move |resolver: &Resolver<T, E>| {
        resolver.succeed(value.clone())
    })
}

/// A task that fails with `error` after `delay`.
pub fn after_rejected<T: Value, E: Value>(delay: Duration, error: E) -> Task<T, E> {
    delayed(delay, move |resolver: &Resolver<T, E>| {
        resolver.fail(error.clone())
    })
}

impl<T: Value, E: Value> Task<T, E> {
    /// Fails with `error` unless this task settles within `delay`.
    ///
    /// Whichever side loses is canceled.
    pub fn timeout(&self, delay: Duration, error: E) -> Self {
        self.concat(&after_rejected(delay, error))
    }
}
