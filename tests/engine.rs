//! End-to-end behavior of the execution engine on a paused tokio clock.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use settle::{Config, Handlers, Resolver, Task, Teardown, UnhandledFailure, runtime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// A leaf that settles with `outcome` after `delay` and counts how often it was canceled.
fn delayed<T>(
    delay: Duration,
    outcome: Result<T, String>,
    canceled: &Arc<AtomicUsize>,
) -> Task<T, String>
where
    T: Clone + Send + Sync + 'static,
{
    let canceled = canceled.clone();
    Task::create(move |r: Resolver<T, String>| {
        let token = CancellationToken::new();
        let child = token.clone();
        let outcome = outcome.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = sleep(delay) => match outcome {
                    Ok(v) => r.succeed(v),
                    Err(e) => r.fail(e),
                },
            }
        });
        let canceled = canceled.clone();
        Teardown::on_cancel(move || {
            canceled.fetch_add(1, Ordering::SeqCst);
        })
        .with_on_close(move || token.cancel())
    })
}

#[tokio::test(start_paused = true)]
async fn all_preserves_input_order_when_first_is_slowest() {
    let none = Arc::new(AtomicUsize::new(0));
    let task = Task::all([
        delayed(Duration::from_millis(30), Ok(1), &none),
        Task::of(2),
        Task::of(3),
    ]);
    assert_eq!(task.await.unwrap(), vec![1, 2, 3]);
    assert_eq!(none.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn all_fails_fast_and_cancels_the_never_settling_task() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let c = cleanups.clone();
    let never: Task<u32, String> = Task::create(move |_r| {
        let c = c.clone();
        Teardown::on_cancel(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    });

    let task = Task::all([Task::of(1), Task::rejected("e".to_string()), never]);
    let err = task.await.unwrap_err();
    assert_eq!(err.into_failure().as_deref(), Some("e"));
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn race_settles_with_fastest_and_cancels_slow() {
    let slow_canceled = Arc::new(AtomicUsize::new(0));
    let fast_canceled = Arc::new(AtomicUsize::new(0));
    let task = Task::race([
        delayed(Duration::from_millis(50), Ok("slow"), &slow_canceled),
        delayed(Duration::from_millis(10), Ok("fast"), &fast_canceled),
    ]);

    assert_eq!(task.await.unwrap(), "fast");
    assert_eq!(slow_canceled.load(Ordering::SeqCst), 1);
    assert_eq!(fast_canceled.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_settlement_silences_the_run() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let none = Arc::new(AtomicUsize::new(0));
    let task = delayed(Duration::from_millis(100), Ok(5u32), &none);

    let cancel = task.run(move |_v: u32| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    sleep(Duration::from_millis(150)).await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(none.load(Ordering::SeqCst), 1);
}

#[test]
fn double_succeed_is_observed_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let task: Task<u32, String> = Task::create(|r: Resolver<u32, String>| {
        r.succeed(1);
        r.succeed(2);
        r.fail("late".to_string());
    });
    task.run(move |v: u32| s.lock().unwrap().push(v));
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[test]
fn unhandled_failure_is_raised_with_its_value() {
    let task: Task<u32, String> = Task::of(1).chain(|_x| Task::rejected("lost".to_string()));
    let raised = catch_unwind(AssertUnwindSafe(|| {
        task.run(|_v: u32| {});
    }))
    .unwrap_err();
    let err = raised.downcast::<UnhandledFailure<String>>().unwrap();
    assert_eq!(err.failure, "lost");
}

#[test]
fn logging_policy_swallows_unhandled_failure() {
    let task: Task<u32, String> = Task::rejected("only logged".to_string());
    task.run(Handlers::with_config(|_v: u32| {}, &Config::logging()));
}

#[test]
fn body_panic_before_settling_becomes_defect() {
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    let task: Task<u32, String> = Task::create(|_r| -> Teardown { panic!("body broke") });
    task.run(
        Handlers::new(|_v: u32| {})
            .with_defect(move |d| *s.lock().unwrap() = Some(d.message().to_string())),
    );
    assert_eq!(seen.lock().unwrap().as_deref(), Some("body broke"));
}

#[test]
fn cancel_from_inside_success_handler_is_a_no_op() {
    let slot: Arc<Mutex<Option<settle::Cancel>>> = Arc::default();
    let closes = Arc::new(AtomicUsize::new(0));
    let parked: Arc<Mutex<Option<Resolver<u32, String>>>> = Arc::default();
    let c = closes.clone();
    let p = parked.clone();
    let task: Task<u32, String> = Task::create(move |r| {
        *p.lock().unwrap() = Some(r);
        let c = c.clone();
        Teardown::on_close(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    });

    let s = slot.clone();
    let cancel = task.run(move |_v: u32| {
        if let Some(cancel) = s.lock().unwrap().take() {
            cancel.cancel();
        }
    });
    *slot.lock().unwrap() = Some(cancel);

    let resolver = parked.lock().unwrap().take().unwrap();
    resolver.succeed(1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(!resolver.is_pending());
}

#[test]
fn settles_from_another_thread() {
    let (tx, rx) = std::sync::mpsc::channel();
    let task: Task<u32, String> = Task::create(|r: Resolver<u32, String>| {
        std::thread::spawn(move || r.succeed(9));
    });
    task.run(move |v: u32| tx.send(v).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 9);
}

#[tokio::test(start_paused = true)]
async fn timeout_composes_with_chain() {
    let fetch: Task<u32, String> = runtime::after(Duration::from_secs(5), 1);
    let task = fetch
        .chain(|x| runtime::after(Duration::from_millis(1), x + 1))
        .timeout(Duration::from_millis(100), "too slow".to_string());
    let err = task.await.unwrap_err();
    assert_eq!(err.as_label(), "task_failed");
    assert_eq!(err.into_failure().as_deref(), Some("too slow"));
}

#[test]
fn all_with_default_handlers_cancels_never_settling_sibling_before_raising() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Resolver<u32, String>>>> = Arc::default();
    let (c, s) = (cleanups.clone(), slot.clone());
    let failing: Task<u32, String> = Task::create(move |r: Resolver<u32, String>| {
        *s.lock().unwrap() = Some(r);
    });
    let never: Task<u32, String> = Task::create(move |_r| {
        let c = c.clone();
        Teardown::on_cancel(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    });

    let cancel = Task::all([failing, never]).run(|_v: Vec<u32>| {});
    let resolver = slot.lock().unwrap().take().unwrap();
    let raised = catch_unwind(AssertUnwindSafe(|| resolver.fail("boom".to_string())))
        .unwrap_err();

    assert_eq!(raised.downcast::<UnhandledFailure<String>>().unwrap().failure, "boom");
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(cancel.is_spent());
}
