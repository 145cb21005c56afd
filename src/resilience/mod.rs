//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Before each attempt:
//!     → registry.rs (identity → shared breaker, created on first use)
//!     → circuit_breaker.rs (gate: admit, admit as probe, or reject)
//! After each attempt:
//!     → circuit_breaker.rs (record success/failure, maybe transition)
//! Between attempts:
//!     → backoff.rs (delay for the attempt just completed)
//!     → waiter.rs (sleep until delay elapses or cancellation fires)
//! ```
//!
//! # Design Decisions
//! - Breaker state is process-local and keyed by operation identity
//! - Breakers are only locked for counter/state updates, never across an attempt
//! - Delay curves are configuration; the loop only consumes them
//! - Timers sit behind a swappable factory so tests never sleep

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;
pub mod waiter;

pub use backoff::{BackoffPolicy, ConstantBackoff, ExponentialBackoff, NoBackoff};
pub use circuit_breaker::{BreakerConfig, BreakerPermit, BreakerStats, CircuitBreaker, CircuitState};
pub use registry::BreakerRegistry;
pub use waiter::{
    default_waiter_factory, reset_default_waiter_factory, set_default_waiter_factory,
    InstantWaiterFactory, RecordingWaiterFactory, TokioWaiter, TokioWaiterFactory, Waiter,
    WaiterFactory,
};
