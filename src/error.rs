//! Error taxonomy for resilient execution.
//!
//! Callers match on [`ExecError`] to tell a rejected, exhausted, canceled or
//! plainly faulted operation apart. The original fault is never wrapped in a
//! string; it is carried by value so its type and message survive.

use thiserror::Error;

use crate::operation::OperationId;

/// Terminal failure of a resilient operation.
#[derive(Debug, Error)]
pub enum ExecError<E> {
    /// The circuit breaker rejected the attempt without running it.
    #[error("circuit open for operation '{operation}'")]
    CircuitOpen { operation: OperationId },

    /// The handler asked for another attempt after the limit was reached.
    #[error("max attempts exceeded after {attempts} attempts")]
    MaxAttemptsExceeded {
        attempts: u32,
        #[source]
        last_fault: Option<E>,
    },

    /// Cancellation was observed before the operation produced a result.
    #[error("operation canceled")]
    Canceled,

    /// The action faulted and the handler did not recover it.
    #[error(transparent)]
    Fault(E),
}

impl<E> ExecError<E> {
    /// True if the breaker rejected the attempt.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecError::CircuitOpen { .. })
    }

    /// True if the attempt limit was exhausted.
    pub fn is_max_attempts_exceeded(&self) -> bool {
        matches!(self, ExecError::MaxAttemptsExceeded { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ExecError::Canceled)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, ExecError::Fault(_))
    }

    /// Borrow the underlying action fault, if this error carries one.
    pub fn fault(&self) -> Option<&E> {
        match self {
            ExecError::Fault(e) => Some(e),
            ExecError::MaxAttemptsExceeded { last_fault, .. } => last_fault.as_ref(),
            _ => None,
        }
    }

    /// Recover the underlying action fault, if this error carries one.
    pub fn into_fault(self) -> Option<E> {
        match self {
            ExecError::Fault(e) => Some(e),
            ExecError::MaxAttemptsExceeded { last_fault, .. } => last_fault,
            _ => None,
        }
    }
}

impl<E> From<Canceled> for ExecError<E> {
    fn from(_: Canceled) -> Self {
        ExecError::Canceled
    }
}

/// A wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait canceled")]
pub struct Canceled;
