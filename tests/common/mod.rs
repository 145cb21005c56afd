//! Shared utilities for integration and load testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use resilient_exec::BreakerRegistry;

/// Fault raised by scripted actions; carries the 1-based call number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scripted fault on call {0}")]
pub struct ScriptedFault(pub u32);

/// Counts calls made to a scripted action.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicU32>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Action that faults on its first `failures` calls, then returns the call number.
pub fn fails_first(failures: u32, calls: &Calls) -> impl Fn() -> Result<u32, ScriptedFault> + Send + Sync + 'static {
    let calls = calls.clone();
    move || {
        let n = calls.next();
        if n <= failures {
            Err(ScriptedFault(n))
        } else {
            Ok(n)
        }
    }
}

/// Action that always faults.
pub fn always_fails(calls: &Calls) -> impl Fn() -> Result<u32, ScriptedFault> + Send + Sync + 'static {
    fails_first(u32::MAX, calls)
}

/// Action whose health can be flipped from the test.
#[allow(dead_code)]
pub fn switchable(healthy: &Arc<AtomicBool>, calls: &Calls) -> impl Fn() -> Result<u32, ScriptedFault> + Send + Sync + 'static {
    let healthy = healthy.clone();
    let calls = calls.clone();
    move || {
        let n = calls.next();
        if healthy.load(Ordering::SeqCst) {
            Ok(n)
        } else {
            Err(ScriptedFault(n))
        }
    }
}

/// Registry private to one test, so breakers never leak between tests.
pub fn isolated_registry() -> Arc<BreakerRegistry> {
    Arc::new(BreakerRegistry::default())
}
