// src/core/rate_limit.rs
//
// Token-bucket limiters for mark-node-bad, Vault lookups, cross-region
// replication fetches, and Vault child-token creation (spec.md §5). A
// rejected action is dropped, never queued — callers get a boolean, never a
// blocking wait beyond one token interval. Grounded on the keyed-limiter
// shape in `knhk-workflow-engine`'s `resilience::rate_limit` (the only
// governor usage in the retrieval pack), adapted to the crate's "drop,
// don't queue" semantics instead of `wait()`.

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// An unkeyed limiter, e.g. for the global mark-node-bad bucket.
pub struct RateLimiter {
    inner: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    /// `max_events` over `per`, with `burst` allowed above the sustained rate.
    pub fn new(max_events: u32, per: Duration, burst: u32) -> Self {
        let burst = NonZeroU32::new(burst.max(1)).unwrap();
        let quota = Quota::with_period(per / max_events.max(1))
            .expect("non-zero rate limit period")
            .allow_burst(burst);
        Self {
            inner: GovernorRateLimiter::direct(quota),
        }
    }

    /// Mark-node-bad default: 5 per 30 minutes, burst 10.
    pub fn mark_node_bad_default() -> Self {
        Self::new(5, Duration::from_secs(30 * 60), 10)
    }

    /// Non-blocking: `true` if the action may proceed now, `false` if the
    /// bucket is currently empty. Never waits.
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }
}

/// A limiter keyed per subject (e.g. per target region for replication
/// fetches, or per token accessor for Vault child-token creation).
pub struct KeyedRateLimiter<K>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
{
    inner: GovernorRateLimiter<K, DefaultKeyedStateStore<K>, DefaultClock>,
}

impl<K> KeyedRateLimiter<K>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
{
    pub fn new(max_events: u32, per: Duration, burst: u32) -> Self {
        let burst = NonZeroU32::new(burst.max(1)).unwrap();
        let quota = Quota::with_period(per / max_events.max(1))
            .expect("non-zero rate limit period")
            .allow_burst(burst);
        Self {
            inner: GovernorRateLimiter::keyed(quota),
        }
    }

    pub fn try_acquire(&self, key: &K) -> bool {
        self.inner.check_key(key).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_reject() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn keyed_limiters_are_independent() {
        let limiter: KeyedRateLimiter<String> = KeyedRateLimiter::new(1, Duration::from_secs(60), 1);
        assert!(limiter.try_acquire(&"us-east".to_string()));
        assert!(!limiter.try_acquire(&"us-east".to_string()));
        assert!(limiter.try_acquire(&"us-west".to_string()));
    }
}
