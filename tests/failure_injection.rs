//! Failure injection tests for the execution loop and circuit breaker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilient_exec::resilience::{BreakerRegistry, ConstantBackoff, InstantWaiterFactory, TokioWaiterFactory};
use resilient_exec::{retry_on_fault, BreakerConfig, CircuitState, ExecError, Resilient, Verdict};
use tokio_util::sync::CancellationToken;

mod common;

use common::{always_fails, fails_first, isolated_registry, switchable, Calls, ScriptedFault};

#[tokio::test]
async fn test_scenario_a_succeeds_on_third_attempt() {
    let calls = Calls::new();
    let final_attempt = Arc::new(AtomicU32::new(0));
    let seen = final_attempt.clone();

    let op = Resilient::from_sync(fails_first(2, &calls))
        .registry(isolated_registry())
        .waiter_factory(InstantWaiterFactory)
        .max_attempts(5)
        .on_attempt(move |ctx| {
            seen.store(ctx.attempt(), Ordering::SeqCst);
            if ctx.is_fault() {
                Verdict::Retry
            } else {
                Verdict::Continue
            }
        });

    assert_eq!(op.run().await.unwrap(), 3);
    assert_eq!(final_attempt.load(Ordering::SeqCst), 3);
    assert_eq!(calls.get(), 3);
    // Two failures stay below the default threshold of five.
    assert_eq!(op.circuit_breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_scenario_b_exhausts_two_attempts() {
    let calls = Calls::new();
    let op = Resilient::from_sync(always_fails(&calls))
        .registry(isolated_registry())
        .waiter_factory(InstantWaiterFactory)
        .max_attempts(2)
        .handler(retry_on_fault());

    match op.run().await {
        Err(ExecError::MaxAttemptsExceeded { attempts, last_fault }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last_fault, Some(ScriptedFault(2)));
        }
        other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
    }
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_scenario_c_return_value_on_first_fault() {
    let calls = Calls::new();
    let op = Resilient::from_sync(always_fails(&calls))
        .registry(isolated_registry())
        .max_attempts(5)
        .on_attempt(|ctx| {
            if ctx.is_fault() {
                Verdict::Return(42)
            } else {
                Verdict::Continue
            }
        });

    assert_eq!(op.run().await.unwrap(), 42);
    assert_eq!(calls.get(), 1);
    assert_eq!(op.circuit_breaker().stats().total_failures, 1);
}

#[tokio::test]
async fn test_exactly_n_attempts_when_always_retrying() {
    for limit in [1, 3, 4] {
        let calls = Calls::new();
        let op = Resilient::from_sync(always_fails(&calls))
            .registry(isolated_registry())
            .waiter_factory(InstantWaiterFactory)
            .max_attempts(limit)
            .handler(retry_on_fault());

        let err = op.run().await.unwrap_err();
        match err {
            ExecError::MaxAttemptsExceeded { attempts, last_fault } => {
                assert_eq!(attempts, limit);
                assert_eq!(last_fault, Some(ScriptedFault(limit)));
            }
            other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
        }
        assert_eq!(calls.get(), limit);
    }
}

#[tokio::test]
async fn test_exhaustion_after_success_reports_earlier_fault() {
    let calls = Calls::new();
    let op = Resilient::from_sync(fails_first(1, &calls))
        .registry(isolated_registry())
        .waiter_factory(InstantWaiterFactory)
        .max_attempts(2)
        .on_attempt(|_| Verdict::Retry);

    match op.run().await {
        Err(ExecError::MaxAttemptsExceeded { attempts, last_fault }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last_fault, Some(ScriptedFault(1)));
        }
        other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
    }
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_continue_on_fault_surfaces_it_unchanged() {
    let calls = Calls::new();
    let op = Resilient::from_sync(always_fails(&calls)).registry(isolated_registry());

    let err = op.run().await.unwrap_err();
    assert!(err.is_fault());
    assert_eq!(err.into_fault(), Some(ScriptedFault(1)));
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn test_break_after_success_returns_value() {
    let calls = Calls::new();
    let op = Resilient::from_sync(fails_first(0, &calls))
        .registry(isolated_registry())
        .on_attempt(|_| Verdict::Break);
    assert_eq!(op.run().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_lifecycle_with_threshold_three() {
    let calls = Calls::new();
    let healthy = Arc::new(AtomicBool::new(false));
    let op = Resilient::from_sync(switchable(&healthy, &calls))
        .registry(isolated_registry())
        .operation_id("lifecycle")
        .breaker_config(
            BreakerConfig::new()
                .with_failure_threshold(3)
                .with_open_duration(Duration::from_secs(10)),
        )
        .waiter_factory(InstantWaiterFactory)
        .max_attempts(10)
        .handler(retry_on_fault());

    // Three faults open the circuit; the fourth gate check rejects.
    assert!(op.run().await.unwrap_err().is_circuit_open());
    assert_eq!(calls.get(), 3);
    assert_eq!(op.circuit_breaker().state(), CircuitState::Open);

    // Still open: the action is not invoked.
    assert!(op.run().await.unwrap_err().is_circuit_open());
    assert_eq!(calls.get(), 3);

    // Open duration elapsed: one probe runs, faults, and the circuit reopens.
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(op.run().await.unwrap_err().is_circuit_open());
    assert_eq!(calls.get(), 4);
    assert_eq!(op.circuit_breaker().state(), CircuitState::Open);

    // The failed probe restarted the open clock.
    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(op.run().await.unwrap_err().is_circuit_open());
    assert_eq!(calls.get(), 4);

    // A successful probe closes the circuit.
    tokio::time::advance(Duration::from_secs(5)).await;
    healthy.store(true, Ordering::SeqCst);
    assert_eq!(op.run().await.unwrap(), 5);
    assert_eq!(op.circuit_breaker().state(), CircuitState::Closed);

    let stats = op.circuit_breaker().stats();
    assert_eq!(stats.total_failures, 4);
    assert_eq!(stats.total_successes, 1);
    assert_eq!(stats.window_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_makes_no_further_attempts() {
    let calls = Calls::new();
    let op = Resilient::from_sync(always_fails(&calls))
        .registry(isolated_registry())
        .waiter_factory(TokioWaiterFactory)
        .backoff(ConstantBackoff(Duration::from_secs(60)))
        .max_attempts(5)
        .handler(retry_on_fault());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = op.execute(cancel).await.unwrap_err();
    assert!(err.is_canceled());
    assert_eq!(calls.get(), 1);
}

fn build_at_one_site(registry: &Arc<BreakerRegistry>, calls: &Calls) -> Resilient<u32, ScriptedFault> {
    Resilient::from_sync(always_fails(calls))
        .registry(registry.clone())
        .breaker_config(BreakerConfig::new().with_failure_threshold(2))
}

#[tokio::test]
async fn test_same_site_shares_breaker_explicit_id_does_not() {
    let registry = isolated_registry();
    let calls = Calls::new();

    let first = build_at_one_site(&registry, &calls);
    let second = build_at_one_site(&registry, &calls);
    let named = build_at_one_site(&registry, &calls).operation_id(first.operation().to_string());

    assert_eq!(first.operation(), second.operation());
    assert!(Arc::ptr_eq(&first.circuit_breaker(), &second.circuit_breaker()));
    assert!(!Arc::ptr_eq(&first.circuit_breaker(), &named.circuit_breaker()));

    // Failures through one builder open the circuit for the other.
    first.run().await.unwrap_err();
    first.run().await.unwrap_err();
    assert!(second.run().await.unwrap_err().is_circuit_open());
    assert_eq!(calls.get(), 2);

    // The explicitly named operation is unaffected.
    assert!(named.run().await.unwrap_err().is_fault());
    assert_eq!(calls.get(), 3);
}

#[tokio::test]
async fn test_cancellable_action_sees_token() {
    let cancel = CancellationToken::new();
    let op: Resilient<&'static str, ScriptedFault> = Resilient::cancellable(|token: CancellationToken| async move {
        if token.is_cancelled() {
            Err(ScriptedFault(0))
        } else {
            Ok("live")
        }
    })
    .registry(isolated_registry());

    assert_eq!(op.execute(cancel.clone()).await.unwrap(), "live");
    cancel.cancel();
    assert!(op.execute(cancel).await.unwrap_err().is_canceled());
}
