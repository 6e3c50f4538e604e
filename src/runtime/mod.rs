//! # Tokio bridge.
//!
//! The engine itself is runtime-agnostic: it only moves callbacks around. This
//! module connects it to tokio in both directions:
//!
//! - **into tasks**: [`after`], [`after_rejected`], [`Task::timeout`](crate::Task::timeout)
//!   and [`Task::from_future`](crate::Task::from_future) build leaf tasks whose
//!   work runs on the current tokio runtime;
//! - **out of tasks**: [`Task::settle`](crate::Task::settle) and `IntoFuture`
//!   let async code `.await` a task; dropping the future cancels the run.
//!
//! Leaves built here spawn onto the runtime found with
//! `tokio::runtime::Handle::try_current()`. Running them outside a runtime
//! settles them with a [`Defect`](crate::Defect).

mod future;
mod timer;

pub use timer::{after, after_rejected};

use tokio::runtime::Handle;

use crate::core::Resolver;
use crate::error::Defect;

/// Returns the current runtime handle, or settles `resolver` with a defect.
fn current_handle<T, E>(resolver: &Resolver<T, E>, what: &str) -> Option<Handle>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle),
        Err(err) => {
            resolver.defect(Defect::msg(format!("{what} needs a tokio runtime: {err}")));
            None
        }
    }
}
