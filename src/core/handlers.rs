//! # Handler set.
//!
//! [`Handlers`] bundles the three outcome callbacks of one run:
//! - `success`: the cooperative positive result;
//! - `failure`: the cooperative domain failure (`E`);
//! - `defect`: a captured panic from user code ([`Defect`]).
//!
//! Every handler set carries all three channels from construction. When the
//! caller does not provide one, the [`Config`] decides: by default an unhandled
//! failure is raised as an [`UnhandledFailure`] panic and an unhandled defect is
//! re-raised with its original payload.

use std::fmt;

use crate::config::{Config, UnhandledPolicy};
use crate::error::{Defect, UnhandledFailure};

pub(crate) type Callback<A> = Box<dyn FnOnce(A) + Send>;

/// # Outcome callbacks for one execution instance.
///
/// At most one of the three callbacks is ever invoked, at most once; the other
/// two are dropped at the same moment.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use settle::{Handlers, Task};
///
/// let seen = Arc::new(Mutex::new(None));
/// let s = seen.clone();
///
/// let task: Task<u32, String> = Task::rejected("nope".to_string());
/// task.run(
///     Handlers::new(|_v: u32| {})
///         .with_failure(move |e: String| *s.lock().unwrap() = Some(e)),
/// );
/// assert_eq!(seen.lock().unwrap().as_deref(), Some("nope"));
/// ```
pub struct Handlers<T, E> {
    success: Callback<T>,
    failure: Callback<E>,
    defect: Callback<Defect>,
}

impl<T, E> Handlers<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Success-only handler set; the other channels follow `Config::default()`.
    pub fn new(success: impl FnOnce(T) + Send + 'static) -> Self
    where
        E: fmt::Debug,
    {
        Self::with_config(success, &Config::default())
    }

    /// Success-only handler set; the other channels follow `cfg`.
    pub fn with_config(success: impl FnOnce(T) + Send + 'static, cfg: &Config) -> Self
    where
        E: fmt::Debug,
    {
        Self {
            success: Box::new(success),
            failure: unhandled_failure(cfg.unhandled_failure),
            defect: unhandled_defect(cfg.unhandled_defect),
        }
    }

    /// Handler set with every channel given explicitly.
    pub fn from_parts(
        success: impl FnOnce(T) + Send + 'static,
        failure: impl FnOnce(E) + Send + 'static,
        defect: impl FnOnce(Defect) + Send + 'static,
    ) -> Self {
        Self {
            success: Box::new(success),
            failure: Box::new(failure),
            defect: Box::new(defect),
        }
    }

    /// Replaces the failure channel.
    pub fn with_failure(mut self, failure: impl FnOnce(E) + Send + 'static) -> Self {
        self.failure = Box::new(failure);
        self
    }

    /// Replaces the defect channel.
    pub fn with_defect(mut self, defect: impl FnOnce(Defect) + Send + 'static) -> Self {
        self.defect = Box::new(defect);
        self
    }

    pub(crate) fn into_parts(self) -> (Callback<T>, Callback<E>, Callback<Defect>) {
        (self.success, self.failure, self.defect)
    }

    pub(crate) fn succeed(self, value: T) {
        (self.success)(value)
    }

    pub(crate) fn fail(self, error: E) {
        (self.failure)(error)
    }

    pub(crate) fn raise(self, defect: Defect) {
        (self.defect)(defect)
    }
}

impl<T, E, F> From<F> for Handlers<T, E>
where
    T: Send + 'static,
    E: fmt::Debug + Send + 'static,
    F: FnOnce(T) + Send + 'static,
{
    fn from(success: F) -> Self {
        Handlers::new(success)
    }
}

impl<T, E> fmt::Debug for Handlers<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}

fn unhandled_failure<E>(policy: UnhandledPolicy) -> Callback<E>
where
    E: fmt::Debug + Send + 'static,
{
    match policy {
        UnhandledPolicy::Raise => Box::new(raise_failure::<E>),
        UnhandledPolicy::Log => Box::new(|failure: E| {
            tracing::error!(?failure, "unhandled task failure");
        }),
    }
}

fn raise_failure<E>(failure: E)
where
    E: fmt::Debug + Send + 'static,
{
    std::panic::panic_any(UnhandledFailure { failure })
}

fn reraise_defect(defect: Defect) {
    defect.resume()
}

fn unhandled_defect(policy: UnhandledPolicy) -> Callback<Defect> {
    match policy {
        UnhandledPolicy::Raise => Box::new(reraise_defect),
        UnhandledPolicy::Log => Box::new(|defect: Defect| {
            tracing::error!(defect = %defect, "unhandled task defect");
        }),
    }
}
