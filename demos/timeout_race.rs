//! # Example: timeout_race
//!
//! Demonstrates racing tasks and bounding them with a timeout.
//!
//! Shows how to:
//! - Build timer leaves with [`runtime::after`]
//! - Pick the first settlement with [`Task::race`] (losers are canceled)
//! - Bound a slow pipeline with [`Task::timeout`]
//! - Await a task directly and inspect [`SettleError`]
//!
//! ## Flow
//! ```text
//! race([after(50ms, "slow"), after(10ms, "fast")])  ─► Ok("fast"), slow timer canceled
//!
//! after(5s, 1).chain(+1).timeout(100ms)              ─► Err(Failed("lookup timed out"))
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example timeout_race
//! ```

use std::time::Duration;

use settle::{SettleError, Task, runtime};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== timeout_race example ===\n");

    #[cfg(feature = "logging")]
    settle::init_logging();

    // 1. Race two timers; the slower one is canceled as soon as the faster settles
    let winner: Task<&'static str, String> = Task::race([
        runtime::after(Duration::from_millis(50), "slow"),
        runtime::after(Duration::from_millis(10), "fast"),
    ]);
    println!("[race] winner: {}", winner.await?);

    // 2. A slow pipeline bounded by a timeout
    let lookup: Task<u32, String> = runtime::after(Duration::from_secs(5), 1)
        .chain(|id| Task::of(id + 1))
        .timeout(Duration::from_millis(100), "lookup timed out".to_string());

    match lookup.await {
        Ok(id) => println!("[lookup] resolved {id}"),
        Err(SettleError::Failed(reason)) => println!("[lookup] failed: {reason}"),
        Err(other) => println!("[lookup] {}: {}", other.as_label(), other.as_message()),
    }
    Ok(())
}
