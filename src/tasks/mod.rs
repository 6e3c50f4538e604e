//! # Task tree and its combinators.
//!
//! This module provides the task-related types:
//! - [`Task`] - immutable, lazily-run description of a computation
//! - [`Value`] - bound shared by success and failure values
//!
//! Variant stages live in private submodules:
//! - `transform` - map, map_rejected, chain, or_else
//! - `fanout` - all, race

mod fanout;
mod task;
mod transform;

pub use task::{Task, Value};
