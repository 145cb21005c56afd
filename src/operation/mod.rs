//! Resilient operation subsystem.
//!
//! # Data Flow
//! ```text
//! caller work (cancellable async | async | sync)
//!     → action.rs (normalize to one canonical action)
//!     → builder.rs (Resilient: identity, handler, limits, breaker, waiter)
//!     → executor.rs (Gate → Invoke → Evaluate → Branch → Wait loop)
//!         → context.rs (handler sees the attempt, returns a Verdict)
//!     → Result<T, ExecError<E>>
//! ```
//!
//! # Design Decisions
//! - Identity defaults to the construction call site; explicit names override it
//! - Handlers decide through a returned value, never through side effects
//! - The breaker is charged with the raw outcome before the handler runs

pub mod action;
pub mod builder;
pub mod context;
pub(crate) mod executor;
pub mod identity;

pub use action::{ActionFuture, CanonicalAction};
pub use builder::Resilient;
pub use context::{retry_if, retry_on_fault, AcceptAll, AttemptContext, AttemptHandler, RetryIf, RetryOnFault, Verdict};
pub use identity::OperationId;
