//! Error types produced by the execution engine.
//!
//! This module defines the three error shapes a caller can observe:
//!
//! - [`Defect`]: a panic raised synchronously by user code while a task tree was being run.
//! - [`UnhandledFailure`]: a domain failure that reached the top of a run with no failure handler.
//! - [`SettleError`]: the non-success outcomes of awaiting a task through [`Task::settle`](crate::Task::settle).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// # A captured panic.
///
/// Defects are programming errors (a panicking `chain` continuation, a computation
/// body that panics before returning) as opposed to cooperative domain failures.
/// The original payload is kept so it can be re-raised unchanged with
/// [`std::panic::resume_unwind`].
#[derive(Error, Debug)]
#[error("task defect: {message}")]
pub struct Defect {
    message: String,
    payload: Box<dyn Any + Send>,
}

impl Defect {
    /// Wraps a panic payload as returned by [`std::panic::catch_unwind`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message, payload }
    }

    /// Creates a defect from a plain message, e.g. from a computation that detected
    /// a broken invariant and wants to report it without panicking.
    pub fn msg(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            payload: Box::new(message.clone()),
            message,
        }
    }

    /// Returns the panic message, or a placeholder for non-string payloads.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the original panic payload.
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Re-raises the original panic on the current thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "task_defect"
    }

    /// Returns a human-readable message with details about the defect.
    pub fn as_message(&self) -> String {
        format!("defect: {}", self.message)
    }
}

/// # A domain failure nobody handled.
///
/// Raised (as a panic payload, via [`std::panic::panic_any`]) when a task fails and
/// the [`Handlers`](crate::Handlers) used to run it carry no explicit failure handler.
/// Failures are never swallowed silently.
///
/// # Example
/// ```
/// use settle::{Task, UnhandledFailure};
///
/// let task: Task<u32, &'static str> = Task::rejected("boom");
/// let raised = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
///     task.run(|_v: u32| {});
/// }))
/// .unwrap_err();
///
/// let err = raised.downcast::<UnhandledFailure<&'static str>>().unwrap();
/// assert_eq!(err.failure, "boom");
/// ```
#[derive(Error, Debug)]
#[error("unhandled task failure: {failure:?}")]
pub struct UnhandledFailure<E: fmt::Debug> {
    /// The failure value that reached the top.
    pub failure: E,
}

impl<E: fmt::Debug> UnhandledFailure<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "task_unhandled_failure"
    }

    /// Returns a human-readable message with details about the failure.
    pub fn as_message(&self) -> String {
        format!("unhandled: {:?}", self.failure)
    }
}

/// # Non-success outcomes of an awaited task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettleError<E: fmt::Debug> {
    /// The task settled through its failure channel.
    #[error("task failed: {0:?}")]
    Failed(E),

    /// User code panicked while the task was running.
    #[error(transparent)]
    Defect(Defect),

    /// The execution instance was canceled before it settled.
    #[error("task canceled before settling")]
    Canceled,
}

impl<E: fmt::Debug> SettleError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use settle::SettleError;
    ///
    /// let err: SettleError<&str> = SettleError::Failed("nope");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SettleError::Failed(_) => "task_failed",
            SettleError::Defect(_) => "task_defect",
            SettleError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SettleError::Failed(e) => format!("failed: {e:?}"),
            SettleError::Defect(d) => d.as_message(),
            SettleError::Canceled => "canceled".to_string(),
        }
    }

    /// Returns the failure value, if this is a domain failure.
    pub fn into_failure(self) -> Option<E> {
        match self {
            SettleError::Failed(e) => Some(e),
            _ => None,
        }
    }
}
