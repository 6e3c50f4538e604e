//! # settle
//!
//! **Settle** is a small library of lazy, cancelable tasks for Rust.
//!
//! A [`Task`] describes a computation that has not happened yet. Running it
//! creates an independent execution instance that settles at most once, with a
//! success value, a domain failure, or a defect (a panic captured from user
//! code), and returns a [`Cancel`] handle that stops it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Task::create / of / rejected / empty            runtime::after / from_future
//!                 │                                            │
//!                 ▼                                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Task tree (immutable, shared with Arc, run any number of times)  │
//! │  - map / map_rejected / bimap                                     │
//! │  - chain / or_else / flatten                                      │
//! │  - all / race / ap / concat / timeout                             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   │ run(handlers)
//!                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Settlement guard (one per execution instance)                    │
//! │  - Resolver: succeed / fail / defect, first one wins              │
//! │  - Teardown: on_cancel + on_close hooks, each fired at most once  │
//! │  - Cancel: idempotent handle returned to the caller               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     success(T)        failure(E)        defect(Defect)
//!        │                  │                  │
//!        └──────── Handlers (missing channels follow Config) ─────────┘
//! ```
//!
//! ### Lifecycle of one run
//! ```text
//! run(handlers) ──► Pending ──┬─ succeed / fail / defect ─► Settled ─► on_close
//!                             └─ Cancel::cancel() ────────► Canceled ─► on_cancel, on_close
//!
//! Settled and Canceled are terminal: later settlements and cancels are no-ops,
//! and handler references are dropped on the transition.
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types                                |
//! |-------------------|-----------------------------------------------------------------|------------------------------------------|
//! | **Tasks**         | Build and combine lazy computations.                            | [`Task`], [`Value`]                      |
//! | **Engine**        | Settle once, cancel once, run cleanup hooks.                    | [`Resolver`], [`Teardown`], [`Cancel`]   |
//! | **Handlers**      | Three outcome channels with configurable fallbacks.             | [`Handlers`], [`Config`]                 |
//! | **Errors**        | Typed errors for defects, unhandled failures and awaiting.      | [`Defect`], [`UnhandledFailure`], [`SettleError`] |
//! | **Tokio bridge**  | Timers, futures in, `.await` out.                               | [`runtime`], [`Task::settle`]            |
//!
//! ## Optional features
//! - `logging`: exports [`init_logging`], a `tracing-subscriber` fmt setup
//!   driven by `RUST_LOG`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use settle::{Task, runtime};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user: Task<String, String> = runtime::after(Duration::from_millis(5), "ada".to_string());
//!     let greeting = user
//!         .map(|name| format!("hello, {name}"))
//!         .timeout(Duration::from_secs(1), "lookup timed out".to_string());
//!
//!     let both = Task::all([greeting.clone(), Task::of("hi".to_string())]);
//!     assert_eq!(both.await?, vec!["hello, ada".to_string(), "hi".to_string()]);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod tasks;

pub mod runtime;

// ---- Public re-exports ----

pub use config::{Config, UnhandledPolicy};
pub use self::core::{Cancel, Handlers, Resolver, Teardown};
pub use error::{Defect, SettleError, UnhandledFailure};
pub use tasks::{Task, Value};

// Optional: expose a ready-made tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod logging;
#[cfg(feature = "logging")]
pub use logging::init_logging;
