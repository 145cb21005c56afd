//! Execution loop.
//!
//! ```text
//! Gate → Invoke → Evaluate → Branch → (Wait → Gate) | Terminate
//! ```
//!
//! Attempts of one invocation run strictly one after another. The breaker is
//! consulted before each attempt and told the real outcome after it, before
//! the handler gets to mask a fault with a fallback value.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::observability::metrics;
use crate::operation::builder::Resilient;
use crate::operation::context::{AttemptContext, Verdict};
use crate::operation::OperationId;

/// What the loop does after an attempt's verdict is known.
#[derive(Debug)]
pub(crate) enum Step<T, E> {
    Finish(Result<T, ExecError<E>>),
    /// Run another attempt, remembering the most recent fault seen so far.
    Wait(Option<E>),
}

/// Branch step: a pure function of the attempt outcome, the verdict and the
/// most recent fault from earlier attempts.
pub(crate) fn branch<T, E>(
    outcome: Result<T, E>,
    verdict: Verdict<T>,
    attempt: u32,
    max_attempts: u32,
    last_fault: Option<E>,
) -> Step<T, E> {
    match verdict {
        Verdict::Return(value) => Step::Finish(Ok(value)),
        // Without a Return there is no substitute value: a success yields its
        // own value and a fault is surfaced unchanged.
        Verdict::Continue | Verdict::Break => Step::Finish(outcome.map_err(ExecError::Fault)),
        Verdict::Retry if attempt >= max_attempts => Step::Finish(Err(ExecError::MaxAttemptsExceeded {
            attempts: attempt,
            last_fault: outcome.err().or(last_fault),
        })),
        Verdict::Retry => Step::Wait(outcome.err().or(last_fault)),
    }
}

pub(crate) async fn run<T, E>(op: &Resilient<T, E>, cancel: CancellationToken) -> Result<T, ExecError<E>>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let operation = &op.operation;
    let breaker = op.circuit_breaker();
    let waiters = op.resolve_waiter_factory();
    let mut attempt: u32 = 0;
    let mut last_fault: Option<E> = None;

    loop {
        if cancel.is_cancelled() {
            return finish(operation, attempt, Err(ExecError::Canceled));
        }

        // Gate
        let Some(permit) = breaker.try_acquire() else {
            return finish(
                operation,
                attempt,
                Err(ExecError::CircuitOpen {
                    operation: operation.clone(),
                }),
            );
        };

        // Invoke
        attempt += 1;
        tracing::debug!(operation = %operation, attempt, probe = permit.is_probe(), "Starting attempt");
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = op.action.invoke(cancel.clone()) => Some(outcome),
        };

        // A fault raised while the token is canceled is the action giving up,
        // not a real failure: the attempt did not complete.
        let outcome = match outcome {
            Some(outcome) if !(outcome.is_err() && cancel.is_cancelled()) => outcome,
            _ => {
                drop(permit);
                return finish(operation, attempt, Err(ExecError::Canceled));
            }
        };

        // Evaluate
        match &outcome {
            Ok(_) => {
                permit.record_success();
                metrics::record_attempt(operation, "success");
            }
            Err(e) => {
                permit.record_failure();
                metrics::record_attempt(operation, "fault");
                tracing::warn!(operation = %operation, attempt, error = %e, "Attempt faulted");
            }
        }

        let verdict = {
            let ctx = AttemptContext::new(operation, attempt, op.max_attempts, &outcome, &breaker, &cancel);
            op.handler.on_attempt(&ctx)
        };

        // Branch
        match branch(outcome, verdict, attempt, op.max_attempts, last_fault.take()) {
            Step::Finish(result) => return finish(operation, attempt, result),
            Step::Wait(fault) => last_fault = fault,
        }

        // Wait
        let delay = op.backoff.delay(attempt);
        tracing::info!(
            operation = %operation,
            attempt,
            max_attempts = op.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Retrying after delay"
        );
        let waiter = waiters.waiter(cancel.clone());
        if waiter.wait(delay).await.is_err() {
            return finish(operation, attempt, Err(ExecError::Canceled));
        }
    }
}

fn finish<T, E>(operation: &OperationId, attempts: u32, result: Result<T, ExecError<E>>) -> Result<T, ExecError<E>>
where
    E: fmt::Display,
{
    let label = match &result {
        Ok(_) => "ok",
        Err(ExecError::CircuitOpen { .. }) => "circuit_open",
        Err(ExecError::MaxAttemptsExceeded { .. }) => "max_attempts_exceeded",
        Err(ExecError::Canceled) => "canceled",
        Err(ExecError::Fault(_)) => "fault",
    };
    match &result {
        Ok(_) => tracing::debug!(operation = %operation, attempts, "Operation completed"),
        Err(e) => tracing::warn!(operation = %operation, attempts, outcome = label, error = %e, "Operation failed"),
    }
    metrics::record_execution(operation, label);
    result
}
