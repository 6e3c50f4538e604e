//! # Example: cancel_task
//!
//! Demonstrates how to cancel a running task before it settles.
//!
//! Shows how to:
//! - Wrap a spawned tokio job as a leaf with [`Task::create`]
//! - Register cleanup with [`Teardown::on_cancel`] / [`Teardown::with_on_close`]
//! - Stop the run through the [`Cancel`] handle returned by [`Task::run`]
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► task.run(handlers)            ─► spawns a 100ms job, returns Cancel
//!   ├─► sleep 10ms
//!   ├─► cancel.cancel()
//!   │     ├─► on_cancel: "[worker] cancel requested"
//!   │     └─► on_close:  token cancelled, job exits
//!   └─► sleep 150ms                   ─► success handler never runs
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cancel_task
//! ```

use std::time::Duration;

use settle::{Handlers, Resolver, Task, Teardown};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== cancel_task example ===\n");

    #[cfg(feature = "logging")]
    settle::init_logging();

    // 1. A leaf that succeeds after 100ms unless canceled first
    let worker: Task<&'static str, String> = Task::create(|resolver: Resolver<_, String>| {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => println!("[worker] job stopped"),
                _ = tokio::time::sleep(Duration::from_millis(100)) => resolver.succeed("done"),
            }
        });
        Teardown::on_cancel(|| println!("[worker] cancel requested"))
            .with_on_close(move || token.cancel())
    });

    // 2. Run it with explicit handlers for every channel
    let cancel = worker.run(
        Handlers::<&str, String>::new(|v| println!("[main] settled with {v}"))
            .with_failure(|e: String| println!("[main] failed: {e}")),
    );

    // 3. Cancel at 10ms, then wait past the point where it would have settled
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(150)).await;

    println!("\n[main] spent handle: {}", cancel.is_spent());
    Ok(())
}
