//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! breaker transitions, attempts, terminal outcomes:
//!     → tracing macros (structured fields: operation, attempt, delay_ms, ...)
//!     → metrics.rs (labelled counters)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber filtered by EnvFilter)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; installing subscribers and recorders is the binary's job
//! - Counters are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
