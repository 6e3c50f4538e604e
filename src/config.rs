//! # Engine configuration.
//!
//! Provides [`Config`], the settings that decide what happens to outcomes that
//! reach the top of a run with nobody listening.
//!
//! Config is used when building [`Handlers`](crate::Handlers):
//! 1. **Implicit**: `Handlers::new(success)` uses `Config::default()`
//! 2. **Explicit**: `Handlers::with_config(success, &config)`
//!
//! Explicit `with_failure` / `with_defect` handlers always win over the config.

/// What to do with a failure or defect that has no explicit handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnhandledPolicy {
    /// Raise it as a panic on the thread that delivered it.
    ///
    /// Failures are raised with an [`UnhandledFailure`](crate::UnhandledFailure)
    /// payload; defects are re-raised with their original payload.
    #[default]
    Raise,

    /// Report it with `tracing::error!` and continue.
    Log,
}

impl UnhandledPolicy {
    /// Returns `true` if this policy raises.
    #[inline]
    pub fn raises(self) -> bool {
        matches!(self, UnhandledPolicy::Raise)
    }
}

/// Configuration for outcome handling at the top of a run.
///
/// ## Field semantics
/// - `unhandled_failure`: applied when a domain failure arrives and no failure handler was given
/// - `unhandled_defect`: applied when a defect arrives and no defect handler was given
///
/// ## Example
/// ```
/// use settle::{Config, Handlers, Task, UnhandledPolicy};
///
/// let mut cfg = Config::default();
/// cfg.unhandled_failure = UnhandledPolicy::Log;
///
/// let task: Task<u32, &'static str> = Task::rejected("ignored but logged");
/// task.run(Handlers::with_config(|_v: u32| {}, &cfg));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Policy for failures without a handler (default: raise).
    pub unhandled_failure: UnhandledPolicy,

    /// Policy for defects without a handler (default: raise).
    pub unhandled_defect: UnhandledPolicy,
}

impl Config {
    /// Configuration that logs instead of raising for both channels.
    pub fn logging() -> Self {
        Self {
            unhandled_failure: UnhandledPolicy::Log,
            unhandled_defect: UnhandledPolicy::Log,
        }
    }
}
