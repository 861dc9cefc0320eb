//! Concurrent callers sharing one breaker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breaker::{Breaker, BreakerError, CallContext, Counts, ManualClock, State};
use tokio::sync::Semaphore;

mod common;

use common::{Fail, FlakyAction};

/// Wait until `cond` holds, yielding to other tasks in between.
async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// A breaker whose action blocks until the gate hands out a permit.
fn gated_breaker(
    clock: &ManualClock,
    gate: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
    fail: bool,
) -> breaker::BreakerBuilder<Fail> {
    Breaker::builder().clock(clock.clone()).action(move |_ctx| {
        let gate = gate.clone();
        let entered = entered.clone();
        async move {
            entered.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await;
            if fail {
                Err(Fail)
            } else {
                Ok(())
            }
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_half_open_budget_bounds_concurrent_trials() {
    let clock = ManualClock::new();
    let ctx = CallContext::new();
    let trial_gate = Arc::new(Semaphore::new(0));
    let trial_entered = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::new(AtomicUsize::new(0));

    // The first call fails and trips the breaker; later calls block on the gate.
    let gate_for_action = trial_gate.clone();
    let entered_for_action = trial_entered.clone();
    let trial = Arc::new(
        Breaker::builder()
            .clock(clock.clone())
            .consecutive_failure_threshold(1)
            .half_open_max_actions(2)
            .action(move |_ctx| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let gate = gate_for_action.clone();
                let entered = entered_for_action.clone();
                async move {
                    if attempt == 0 {
                        return Err(Fail);
                    }
                    entered.fetch_add(1, Ordering::SeqCst);
                    let _permit = gate.acquire().await;
                    Ok(())
                }
            })
            .build()
            .unwrap(),
    );

    assert!(trial.execute(&ctx).await.is_err());
    clock.advance(Duration::from_secs(60));
    assert_eq!(trial.state(&ctx), State::HalfOpen);

    let rejected = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..5 {
        let trial = trial.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            let result = trial.execute(&CallContext::new()).await;
            if matches!(result, Err(BreakerError::TooManyRequests)) {
                rejected.fetch_add(1, Ordering::SeqCst);
            }
            result
        }));
    }

    wait_until(|| {
        trial_entered.load(Ordering::SeqCst) == 2 && rejected.load(Ordering::SeqCst) == 3
    })
    .await;
    assert_eq!(trial.counts(&ctx).requests, 2);
    trial_gate.add_permits(2);

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(BreakerError::TooManyRequests) => {}
            Err(other) => panic!("unexpected result: {other}"),
        }
    }
    assert_eq!(ok, 2);
    assert_eq!(trial_entered.load(Ordering::SeqCst), 2);
    assert_eq!(trial.state(&ctx), State::Closed);
    // The second trial finished after the first one closed the breaker.
    assert_eq!(trial.counts(&ctx), Counts::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_updates_under_contention() {
    let clock = ManualClock::new();
    let action = FlakyAction::new();
    let breaker = Arc::new(
        action
            .builder(&clock)
            .closed_expiry_interval(Duration::ZERO)
            .build()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..32 {
        let breaker = breaker.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                breaker.execute(&CallContext::new()).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let counts = breaker.counts(&CallContext::new());
    assert_eq!(counts.requests, 1_600);
    assert_eq!(counts.total_successes, 1_600);
    assert_eq!(counts.requests, counts.total_successes + counts.total_failures);
    assert_eq!(action.calls(), 1_600);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_failures_trip_once() {
    let clock = ManualClock::new();
    let action = FlakyAction::new();
    action.set_failing(true);
    let opened = Arc::new(AtomicUsize::new(0));
    let opened_hook = opened.clone();
    let breaker = Arc::new(
        action
            .builder(&clock)
            .consecutive_failure_threshold(5)
            .on_state_change(move |_ctx, _from, to| {
                if to == State::Open {
                    opened_hook.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..64 {
        let breaker = breaker.clone();
        handles.push(tokio::spawn(async move { breaker.execute(&CallContext::new()).await }));
    }

    let mut failed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(BreakerError::Operation(Fail)) => failed += 1,
            Err(BreakerError::Open) => rejected += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(failed + rejected, 64);
    assert!(failed >= 5);
    assert_eq!(failed, action.calls());
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    let ctx = CallContext::new();
    assert_eq!(breaker.state(&ctx), State::Open);
    assert_eq!(breaker.counts(&ctx), Counts::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_action_does_not_block_queries() {
    let clock = ManualClock::new();
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let breaker = Arc::new(
        gated_breaker(&clock, gate.clone(), entered.clone(), true)
            .closed_expiry_interval(Duration::ZERO)
            .build()
            .unwrap(),
    );

    let in_flight = {
        let breaker = breaker.clone();
        tokio::spawn(async move { breaker.execute(&CallContext::new()).await })
    };
    wait_until(|| entered.load(Ordering::SeqCst) == 1).await;

    // Admission is already committed while the action is still running.
    let ctx = CallContext::new();
    assert_eq!(breaker.state(&ctx), State::Closed);
    assert_eq!(breaker.counts(&ctx), Counts::new(1, 0, 0, 0, 0));

    gate.add_permits(1);
    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(BreakerError::Operation(Fail))));
    assert_eq!(breaker.counts(&ctx), Counts::new(1, 0, 1, 0, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outcome_admitted_before_sweep_is_not_counted() {
    let clock = ManualClock::new();
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let breaker = Arc::new(
        gated_breaker(&clock, gate.clone(), entered.clone(), false)
            .closed_expiry_interval(Duration::from_secs(10))
            .build()
            .unwrap(),
    );

    let in_flight = {
        let breaker = breaker.clone();
        tokio::spawn(async move { breaker.execute(&CallContext::new()).await })
    };
    wait_until(|| entered.load(Ordering::SeqCst) == 1).await;

    let ctx = CallContext::new();
    clock.advance(Duration::from_secs(10));
    assert_eq!(breaker.counts(&ctx), Counts::default());

    gate.add_permits(1);
    assert!(in_flight.await.unwrap().is_ok());

    let counts = breaker.counts(&ctx);
    assert_eq!(counts, Counts::default());
    assert_eq!(counts.requests, counts.total_successes + counts.total_failures);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_closed_era_success_does_not_close_half_open() {
    let clock = ManualClock::new();
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::new(AtomicUsize::new(0));

    // The first call is slow and succeeds; every later call fails at once.
    let gate_for_action = gate.clone();
    let entered_for_action = entered.clone();
    let breaker = Arc::new(
        Breaker::builder()
            .clock(clock.clone())
            .consecutive_failure_threshold(1)
            .action(move |_ctx| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let gate = gate_for_action.clone();
                let entered = entered_for_action.clone();
                async move {
                    if attempt > 0 {
                        return Err(Fail);
                    }
                    entered.fetch_add(1, Ordering::SeqCst);
                    let _permit = gate.acquire().await;
                    Ok(())
                }
            })
            .build()
            .unwrap(),
    );

    let slow = {
        let breaker = breaker.clone();
        tokio::spawn(async move { breaker.execute(&CallContext::new()).await })
    };
    wait_until(|| entered.load(Ordering::SeqCst) == 1).await;

    let ctx = CallContext::new();
    let tripped = breaker.execute(&ctx).await;
    assert!(matches!(tripped, Err(BreakerError::Operation(Fail))));
    assert_eq!(breaker.state(&ctx), State::Open);

    clock.advance(Duration::from_secs(60));
    assert_eq!(breaker.state(&ctx), State::HalfOpen);

    gate.add_permits(1);
    assert!(slow.await.unwrap().is_ok());

    // No trial was admitted, so the breaker is still waiting for one.
    let snapshot = breaker.snapshot(&ctx);
    assert_eq!(snapshot.state, State::HalfOpen);
    assert_eq!(snapshot.counts, Counts::default());

    let trial = breaker.execute(&ctx).await;
    assert!(matches!(trial, Err(BreakerError::Operation(Fail))));
    assert_eq!(breaker.state(&ctx), State::Open);
}
