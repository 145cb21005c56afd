//! Inter-attempt delay.
//!
//! # Responsibilities
//! - Suspend until a delay elapses or the operation is canceled
//! - Provide a process-wide default factory that tests can swap out
//! - Ship deterministic doubles that never touch a real timer
//!
//! # Design Decisions
//! - One waiter per delay request, bound to the operation's cancellation token
//! - Per-operation factories win over the process-wide default
//! - The default is held in an `ArcSwap` so swapping never blocks readers

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Canceled;

/// Suspends the caller for a delay, unless canceled first.
pub trait Waiter: Send + Sync {
    fn wait(&self, delay: Duration) -> BoxFuture<'_, Result<(), Canceled>>;
}

/// Produces a waiter bound to one cancellation token.
pub trait WaiterFactory: Send + Sync {
    fn waiter(&self, cancel: CancellationToken) -> Box<dyn Waiter>;
}

impl<F, W> WaiterFactory for F
where
    F: Fn(CancellationToken) -> W + Send + Sync,
    W: Waiter + 'static,
{
    fn waiter(&self, cancel: CancellationToken) -> Box<dyn Waiter> {
        Box::new(self(cancel))
    }
}

/// Timer-backed waiter.
#[derive(Debug, Clone)]
pub struct TokioWaiter {
    cancel: CancellationToken,
}

impl TokioWaiter {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Waiter for TokioWaiter {
    fn wait(&self, delay: Duration) -> BoxFuture<'_, Result<(), Canceled>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Canceled),
                _ = tokio::time::sleep(delay) => Ok(()),
            }
        })
    }
}

/// Factory for [`TokioWaiter`]; the process-wide default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioWaiterFactory;

impl WaiterFactory for TokioWaiterFactory {
    fn waiter(&self, cancel: CancellationToken) -> Box<dyn Waiter> {
        Box::new(TokioWaiter::new(cancel))
    }
}

/// Waiter that returns at once. Cancellation is still honoured.
#[derive(Debug, Clone)]
pub struct InstantWaiter {
    cancel: CancellationToken,
}

impl Waiter for InstantWaiter {
    fn wait(&self, _delay: Duration) -> BoxFuture<'_, Result<(), Canceled>> {
        let result = if self.cancel.is_cancelled() { Err(Canceled) } else { Ok(()) };
        Box::pin(futures_util::future::ready(result))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstantWaiterFactory;

impl WaiterFactory for InstantWaiterFactory {
    fn waiter(&self, cancel: CancellationToken) -> Box<dyn Waiter> {
        Box::new(InstantWaiter { cancel })
    }
}

/// Instant waiter that remembers every delay it was asked for.
#[derive(Debug, Clone, Default)]
pub struct RecordingWaiterFactory {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingWaiterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("recording waiter mutex poisoned").clone()
    }
}

struct RecordingWaiter {
    cancel: CancellationToken,
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl Waiter for RecordingWaiter {
    fn wait(&self, delay: Duration) -> BoxFuture<'_, Result<(), Canceled>> {
        self.delays.lock().expect("recording waiter mutex poisoned").push(delay);
        let result = if self.cancel.is_cancelled() { Err(Canceled) } else { Ok(()) };
        Box::pin(futures_util::future::ready(result))
    }
}

impl WaiterFactory for RecordingWaiterFactory {
    fn waiter(&self, cancel: CancellationToken) -> Box<dyn Waiter> {
        Box::new(RecordingWaiter {
            cancel,
            delays: self.delays.clone(),
        })
    }
}

static DEFAULT_FACTORY: OnceLock<ArcSwap<Arc<dyn WaiterFactory>>> = OnceLock::new();

fn default_slot() -> &'static ArcSwap<Arc<dyn WaiterFactory>> {
    DEFAULT_FACTORY.get_or_init(|| {
        ArcSwap::from_pointee(Arc::new(TokioWaiterFactory) as Arc<dyn WaiterFactory>)
    })
}

/// The factory used by operations that were not given one explicitly.
pub fn default_waiter_factory() -> Arc<dyn WaiterFactory> {
    Arc::clone(&**default_slot().load())
}

/// Replace the process-wide default factory.
pub fn set_default_waiter_factory<F>(factory: F)
where
    F: WaiterFactory + 'static,
{
    default_slot().store(Arc::new(Arc::new(factory) as Arc<dyn WaiterFactory>));
    tracing::debug!("Default waiter factory replaced");
}

/// Restore the timer-backed default.
pub fn reset_default_waiter_factory() {
    set_default_waiter_factory(TokioWaiterFactory);
}
