//! Resilient execution engine.
//!
//! Wraps a unit of work with retries, backoff and a per-operation circuit
//! breaker.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                    RESILIENT EXECUTION                    │
//!                    │                                                           │
//!   caller work      │  ┌───────────┐    ┌───────────┐    ┌──────────────────┐   │
//!   ─────────────────┼─▶│  action   │───▶│  builder  │───▶│     executor     │   │
//!   (sync / async /  │  │ canonical │    │ Resilient │    │ Gate → Invoke →  │   │
//!    cancellable)    │  └───────────┘    └─────┬─────┘    │ Evaluate → Branch│   │
//!                    │                         │          │ → Wait           │   │
//!                    │                         ▼          └───┬──────────┬───┘   │
//!                    │                  ┌────────────┐        │          │       │
//!                    │                  │  identity  │        ▼          ▼       │
//!                    │                  │ call site /│  ┌──────────┐ ┌────────┐  │
//!                    │                  │   named    │  │ context  │ │ waiter │  │
//!                    │                  └─────┬──────┘  │ handler  │ │backoff │  │
//!                    │                        ▼         │ Verdict  │ └────────┘  │
//!                    │                  ┌────────────┐  └──────────┘             │
//!   Result<T,        │                  │  registry  │──▶ circuit_breaker        │
//!   ExecError<E>>    │                  └────────────┘   Closed/Open/HalfOpen    │
//!   ◀────────────────┼──                                                        │
//!                    │  ┌─────────────────────────────────────────────────────┐ │
//!                    │  │ Cross-cutting: config (TOML) · observability        │ │
//!                    │  └─────────────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod operation;
pub mod resilience;

pub use config::ResilienceConfig;
pub use error::{Canceled, ExecError};
pub use operation::{retry_if, retry_on_fault, AttemptContext, AttemptHandler, OperationId, Resilient, Verdict};
pub use resilience::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
