//! Canonical action adapter.
//!
//! # Responsibilities
//! - Accept cancellable async, plain async and synchronous work
//! - Normalize all of them to one `(CancellationToken) -> Future<Result<T, E>>`
//!
//! # Design Decisions
//! - Unit-returning work is just `T = ()`; no separate entry points
//! - Building is pure: nothing runs until the executor invokes the action
//! - The action is `Fn`, so each attempt starts from a fresh future

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use tokio_util::sync::CancellationToken;

/// Future produced by one invocation of a canonical action.
pub type ActionFuture<T, E> = BoxFuture<'static, Result<T, E>>;

type ActionFn<T, E> = dyn Fn(CancellationToken) -> ActionFuture<T, E> + Send + Sync;

/// Normalized unit of work, invoked once per attempt.
pub struct CanonicalAction<T, E> {
    f: Arc<ActionFn<T, E>>,
}

impl<T, E> Clone for CanonicalAction<T, E> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<T, E> fmt::Debug for CanonicalAction<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalAction").finish_non_exhaustive()
    }
}

impl<T, E> CanonicalAction<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn canonicalize<F>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> ActionFuture<T, E> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Async work that observes the cancellation token itself.
    pub fn cancellable<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::canonicalize(move |cancel| Box::pin(f(cancel)) as ActionFuture<T, E>)
    }

    /// Async work that ignores cancellation; the executor drops it if canceled.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::canonicalize(move |_| Box::pin(f()) as ActionFuture<T, E>)
    }

    /// Synchronous work, run inline when the attempt is invoked.
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self::canonicalize(move |_| Box::pin(future::ready(f())) as ActionFuture<T, E>)
    }

    pub fn invoke(&self, cancel: CancellationToken) -> ActionFuture<T, E> {
        (self.f)(cancel)
    }
}
