//! Freshness policies deciding between a cache hit and a refetch

use std::time::Duration;

/// Predicate over a container's save time and the current time
///
/// Closures `Fn(Option<i64>, i64) -> bool` are policies too.
pub trait FreshnessPolicy: Send + Sync {
    fn is_fresh(&self, saved_at_millis: Option<i64>, now_millis: i64) -> bool;
}

impl<F> FreshnessPolicy for F
where
    F: Fn(Option<i64>, i64) -> bool + Send + Sync,
{
    fn is_fresh(&self, saved_at_millis: Option<i64>, now_millis: i64) -> bool {
        self(saved_at_millis, now_millis)
    }
}

/// Stale once `now - saved_at` exceeds the time-to-live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl: Duration,
}

impl TtlPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl FreshnessPolicy for TtlPolicy {
    fn is_fresh(&self, saved_at_millis: Option<i64>, now_millis: i64) -> bool {
        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);

        match saved_at_millis {
            // A save stamped ahead of our clock counts as age zero
            Some(saved_at) => now_millis.saturating_sub(saved_at) <= ttl_millis,
            None => false,
        }
    }
}

/// Any cached body is served; the provider is only called on a miss
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFresh;

impl FreshnessPolicy for AlwaysFresh {
    fn is_fresh(&self, _saved_at_millis: Option<i64>, _now_millis: i64) -> bool {
        true
    }
}

/// Every request goes to the provider; storage only acts as a write-through copy
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysStale;

impl FreshnessPolicy for AlwaysStale {
    fn is_fresh(&self, _saved_at_millis: Option<i64>, _now_millis: i64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_policy_boundaries() {
        let policy = TtlPolicy::from_secs(60);

        assert!(policy.is_fresh(Some(1_000), 1_000));
        assert!(policy.is_fresh(Some(1_000), 61_000));
        assert!(!policy.is_fresh(Some(1_000), 61_001));
        assert!(!policy.is_fresh(None, 1_000));
    }

    #[test]
    fn test_ttl_policy_future_save_is_fresh() {
        let policy = TtlPolicy::from_secs(1);
        assert!(policy.is_fresh(Some(10_000), 5_000));
    }

    #[test]
    fn test_fixed_policies() {
        assert!(AlwaysFresh.is_fresh(None, 0));
        assert!(!AlwaysStale.is_fresh(Some(0), 0));
    }

    #[test]
    fn test_closure_policy() {
        let policy = |saved: Option<i64>, now: i64| saved.is_some_and(|s| now - s < 10);

        assert!(policy.is_fresh(Some(5), 10));
        assert!(!policy.is_fresh(Some(0), 10));
    }
}
