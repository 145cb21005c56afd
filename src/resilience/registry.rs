//! Operation identity → circuit breaker store.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::operation::OperationId;
use crate::resilience::circuit_breaker::{BreakerConfig, BreakerStats, CircuitBreaker};

static GLOBAL: OnceLock<Arc<BreakerRegistry>> = OnceLock::new();

/// Concurrency-safe, lazily populated map of breakers.
///
/// Once a breaker exists for an identity it is kept for the registry's
/// lifetime, so every operation using that identity shares one instance.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<OperationId, Arc<CircuitBreaker>>,
    default_config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<BreakerRegistry> {
        GLOBAL.get_or_init(|| Arc::new(BreakerRegistry::default())).clone()
    }

    pub fn default_config(&self) -> &BreakerConfig {
        &self.default_config
    }

    /// Get the breaker for `operation`, creating it with the default config.
    pub fn get_or_create(&self, operation: &OperationId) -> Arc<CircuitBreaker> {
        self.get_or_create_with(operation, &self.default_config)
    }

    /// Get the breaker for `operation`, creating it with `config` if absent.
    ///
    /// Simultaneous first uses race on the map entry; exactly one breaker is
    /// created and every caller receives it.
    pub fn get_or_create_with(&self, operation: &OperationId, config: &BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(operation) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(operation.clone()).or_insert_with(|| {
            tracing::debug!(
                operation = %operation,
                failure_threshold = config.failure_threshold,
                "Circuit breaker created"
            );
            Arc::new(CircuitBreaker::new(operation.clone(), config.clone()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, operation: &OperationId) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(operation).map(|r| Arc::clone(r.value()))
    }

    /// Forget a breaker. Operations already holding it keep their handle.
    pub fn remove(&self, operation: &OperationId) -> Option<Arc<CircuitBreaker>> {
        self.breakers.remove(operation).map(|(_, breaker)| breaker)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Stats for every breaker in the registry.
    pub fn snapshot(&self) -> Vec<BreakerStats> {
        self.breakers.iter().map(|r| r.value().stats()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = BreakerRegistry::default();
        let id = OperationId::named("inventory.lookup");

        assert!(registry.get(&id).is_none());
        let a = registry.get_or_create(&id);
        let b = registry.get_or_create(&id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_creator_config_wins() {
        let registry = BreakerRegistry::default();
        let id = OperationId::named("search");
        let custom = BreakerConfig::new().with_failure_threshold(2);

        let first = registry.get_or_create_with(&id, &custom);
        let second = registry.get_or_create_with(&id, &BreakerConfig::default());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().failure_threshold, 2);
    }

    #[test]
    fn test_concurrent_first_use_yields_one_instance() {
        let registry = Arc::new(BreakerRegistry::new(
            BreakerConfig::new().with_open_duration(Duration::from_secs(1)),
        ));
        let id = OperationId::named("contended");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let id = id.clone();
                std::thread::spawn(move || registry.get_or_create(&id))
            })
            .collect();
        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(breakers.iter().all(|b| Arc::ptr_eq(b, &breakers[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_snapshot() {
        let registry = BreakerRegistry::default();
        registry.get_or_create(&OperationId::named("a"));
        registry.get_or_create(&OperationId::named("b"));

        let mut names: Vec<_> = registry.snapshot().into_iter().map(|s| s.operation).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        assert!(registry.remove(&OperationId::named("a")).is_some());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&BreakerRegistry::global(), &BreakerRegistry::global()));
    }
}
