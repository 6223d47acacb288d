//! The shared coordination state of the classifier.
//!
//! One [`RiskCoordinator`] exists per evaluator and every clone of that
//! evaluator shares it through an `Arc`: the cache, the single-flight gate,
//! and the throttle timestamp are never partitioned per request, room, or
//! message.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::cache::RiskCache;
use super::clock::Clock;
use super::gate::ConcurrencyGate;
use super::throttle::Throttler;

pub struct RiskCoordinator {
    cache: RiskCache,
    gate: ConcurrencyGate,
    throttler: Throttler,
    clock: Arc<dyn Clock>,
}

impl RiskCoordinator {
    pub fn new(min_call_spacing: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: RiskCache::new(),
            gate: ConcurrencyGate::new(),
            throttler: Throttler::new(min_call_spacing),
            clock,
        }
    }

    pub fn cache(&self) -> &RiskCache {
        &self.cache
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl fmt::Debug for RiskCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskCoordinator")
            .field("cache", &self.cache)
            .field("gate", &self.gate)
            .field("throttler", &self.throttler)
            .finish_non_exhaustive()
    }
}
