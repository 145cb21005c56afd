//! Resilient operation builder.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ResilienceConfig;
use crate::error::ExecError;
use crate::operation::action::CanonicalAction;
use crate::operation::context::{AcceptAll, AttemptContext, AttemptHandler, Verdict};
use crate::operation::executor;
use crate::operation::OperationId;
use crate::resilience::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::resilience::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::waiter::{default_waiter_factory, WaiterFactory};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A unit of work wrapped with retry and circuit-breaking behaviour.
///
/// Construct with [`cancellable`](Self::cancellable),
/// [`from_async`](Self::from_async) or [`from_sync`](Self::from_sync), then
/// configure with the chained setters. The builder is reusable: every
/// [`execute`](Self::execute) is an independent invocation sharing the same
/// identity, and therefore the same breaker.
///
/// ```rust,no_run
/// use resilient_exec::{Resilient, retry_on_fault};
///
/// # async fn example() {
/// let fetch = Resilient::from_async(|| async { Ok::<_, std::io::Error>(42u32) })
///     .operation_id("inventory.fetch")
///     .max_attempts(5)
///     .handler(retry_on_fault());
///
/// let value = fetch.run().await;
/// # }
/// ```
pub struct Resilient<T, E> {
    pub(crate) action: CanonicalAction<T, E>,
    pub(crate) operation: OperationId,
    pub(crate) handler: Arc<dyn AttemptHandler<T, E>>,
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Arc<dyn BackoffPolicy>,
    breaker: Option<Arc<CircuitBreaker>>,
    breaker_config: Option<BreakerConfig>,
    registry: Arc<BreakerRegistry>,
    waiter_factory: Option<Arc<dyn WaiterFactory>>,
}

impl<T, E> Clone for Resilient<T, E> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            operation: self.operation.clone(),
            handler: self.handler.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            breaker: self.breaker.clone(),
            breaker_config: self.breaker_config.clone(),
            registry: self.registry.clone(),
            waiter_factory: self.waiter_factory.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resilient<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resilient")
            .field("operation", &self.operation)
            .field("max_attempts", &self.max_attempts)
            .field("breaker_override", &self.breaker.is_some())
            .field("breaker_config", &self.breaker_config)
            .finish_non_exhaustive()
    }
}

impl<T, E> Resilient<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap async work that receives the cancellation token.
    #[track_caller]
    pub fn cancellable<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::from_action(CanonicalAction::cancellable(f))
    }

    /// Wrap async work that does not look at cancellation.
    #[track_caller]
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::from_action(CanonicalAction::from_async(f))
    }

    /// Wrap synchronous work.
    #[track_caller]
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self::from_action(CanonicalAction::from_sync(f))
    }

    /// Wrap an already canonical action. The identity defaults to the
    /// source location of this call.
    #[track_caller]
    pub fn from_action(action: CanonicalAction<T, E>) -> Self {
        Self {
            action,
            operation: OperationId::caller(),
            handler: Arc::new(AcceptAll),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Arc::new(ExponentialBackoff::default()),
            breaker: None,
            breaker_config: None,
            registry: BreakerRegistry::global(),
            waiter_factory: None,
        }
    }

    /// Use an explicit identity instead of the construction site.
    pub fn operation_id(mut self, operation: impl Into<OperationId>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: AttemptHandler<T, E> + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Closure form of [`handler`](Self::handler).
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(&AttemptContext<'_, T, E>) -> Verdict<T> + Send + Sync + 'static,
    {
        self.handler = Arc::new(f);
        self
    }

    /// Attempt limit, counting the first attempt. Zero is treated as one.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn backoff<B>(mut self, backoff: B) -> Self
    where
        B: BackoffPolicy + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Use this breaker directly, bypassing the identity lookup.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Config for the breaker if this builder is the first to use its identity.
    pub fn breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    /// Look breakers up in `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn waiter_factory<W>(mut self, factory: W) -> Self
    where
        W: WaiterFactory + 'static,
    {
        self.waiter_factory = Some(Arc::new(factory));
        self
    }

    /// Apply attempt limit, backoff and breaker thresholds from configuration.
    pub fn with_config(self, config: &ResilienceConfig) -> Self {
        self.max_attempts(config.retry.max_attempts)
            .backoff(config.retry.backoff())
            .breaker_config(config.circuit_breaker.to_breaker_config())
    }

    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// The breaker this operation is gated by.
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        match &self.breaker {
            Some(breaker) => breaker.clone(),
            None => {
                let config = self
                    .breaker_config
                    .as_ref()
                    .unwrap_or_else(|| self.registry.default_config());
                self.registry.get_or_create_with(&self.operation, config)
            }
        }
    }

    pub(crate) fn resolve_waiter_factory(&self) -> Arc<dyn WaiterFactory> {
        self.waiter_factory.clone().unwrap_or_else(default_waiter_factory)
    }

    /// Run the operation until it produces a value or a terminal error.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<T, ExecError<E>>
    where
        E: fmt::Display,
    {
        executor::run(self, cancel).await
    }

    /// [`execute`](Self::execute) with a token nobody else can cancel.
    pub async fn run(&self) -> Result<T, ExecError<E>>
    where
        E: fmt::Display,
    {
        self.execute(CancellationToken::new()).await
    }
}
