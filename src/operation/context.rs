//! Per-attempt context and the handler protocol.
//!
//! After every completed attempt the executor shows the handler an
//! [`AttemptContext`] and the handler answers with a [`Verdict`]. Exactly one
//! verdict exists per attempt, so there is no "last call wins" bookkeeping.

use tokio_util::sync::CancellationToken;

use crate::operation::OperationId;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};

/// Handler decision for one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    /// Accept the attempt as it is: return its value or surface its fault.
    Continue,
    /// Run another attempt, subject to the attempt limit.
    Retry,
    /// Stop now: return the attempt's value, or surface its fault.
    Break,
    /// Stop now and produce this value, discarding any fault.
    Return(T),
}

/// Read-only view of the attempt that just completed.
pub struct AttemptContext<'a, T, E> {
    operation: &'a OperationId,
    attempt: u32,
    max_attempts: u32,
    outcome: &'a Result<T, E>,
    breaker: &'a CircuitBreaker,
    cancel: &'a CancellationToken,
}

impl<'a, T, E> AttemptContext<'a, T, E> {
    pub(crate) fn new(
        operation: &'a OperationId,
        attempt: u32,
        max_attempts: u32,
        outcome: &'a Result<T, E>,
        breaker: &'a CircuitBreaker,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            operation,
            attempt,
            max_attempts,
            outcome,
            breaker,
            cancel,
        }
    }

    pub fn operation(&self) -> &OperationId {
        self.operation
    }

    /// Attempts made so far, including the one just completed.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True if a `Retry` verdict would still be honoured.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn outcome(&self) -> Result<&T, &E> {
        self.outcome.as_ref()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn fault(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    pub fn is_fault(&self) -> bool {
        self.outcome.is_err()
    }

    /// The invocation's cancellation token. A `Retry` returned after it fires
    /// ends the invocation as canceled before the next attempt.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    /// Breaker state after this attempt's outcome was recorded.
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

/// Caller-supplied decision logic run after each attempt.
pub trait AttemptHandler<T, E>: Send + Sync {
    fn on_attempt(&self, ctx: &AttemptContext<'_, T, E>) -> Verdict<T>;
}

impl<T, E, F> AttemptHandler<T, E> for F
where
    F: Fn(&AttemptContext<'_, T, E>) -> Verdict<T> + Send + Sync,
{
    fn on_attempt(&self, ctx: &AttemptContext<'_, T, E>) -> Verdict<T> {
        self(ctx)
    }
}

/// Accepts every outcome as-is. Used when no handler is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<T, E> AttemptHandler<T, E> for AcceptAll {
    fn on_attempt(&self, _ctx: &AttemptContext<'_, T, E>) -> Verdict<T> {
        Verdict::Continue
    }
}

/// Retries every fault; accepts every success.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnFault;

impl<T, E> AttemptHandler<T, E> for RetryOnFault {
    fn on_attempt(&self, ctx: &AttemptContext<'_, T, E>) -> Verdict<T> {
        if ctx.is_fault() {
            Verdict::Retry
        } else {
            Verdict::Continue
        }
    }
}

pub fn retry_on_fault() -> RetryOnFault {
    RetryOnFault
}

/// Retries faults matching a predicate; any other fault is surfaced.
#[derive(Debug, Clone, Copy)]
pub struct RetryIf<P>(P);

impl<T, E, P> AttemptHandler<T, E> for RetryIf<P>
where
    P: Fn(&E) -> bool + Send + Sync,
{
    fn on_attempt(&self, ctx: &AttemptContext<'_, T, E>) -> Verdict<T> {
        match ctx.fault() {
            Some(fault) if (self.0)(fault) => Verdict::Retry,
            _ => Verdict::Continue,
        }
    }
}

pub fn retry_if<E, P>(predicate: P) -> RetryIf<P>
where
    P: Fn(&E) -> bool + Send + Sync,
{
    RetryIf(predicate)
}
