use super::types::{AdmissionStrategy, RateLimitDecision, RateLimitQuota};
use crate::clock::Clock;
use crate::error::{QuotagateError, Result};
use crate::store::WindowStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sliding-window admission engine.
///
/// At any instant, looking back exactly one window period, no more than
/// the allowed number of requests may sit inside that window. Each
/// accepted request is stored as one ordered-set entry (score = its
/// timestamp), so the window slides continuously instead of resetting
/// on fixed boundaries.
///
/// With the counted strategy, the count read happens before the
/// current request is registered, and the register step
/// (add + trim + expire) runs as one store transaction. Under heavy
/// concurrent bursts, requests racing between the two steps can each
/// observe a stale count and be admitted; the scripted strategy removes
/// that gap by running both steps inside one server-side script, with
/// identical header arithmetic.
///
/// Store errors are propagated unchanged: the engine never fails open
/// or closed on its own.
pub struct AdmissionEngine {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    strategy: AdmissionStrategy,
}

impl AdmissionEngine {
    pub fn new(
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
        strategy: AdmissionStrategy,
    ) -> Self {
        Self {
            store,
            clock,
            strategy,
        }
    }

    /// Decide whether the request tallied under `key` may proceed.
    ///
    /// Returns the header values on admission; a rejection surfaces as
    /// `RateLimitExceeded` carrying the retry timing.
    pub async fn admit(
        &self,
        key: &str,
        quota: &RateLimitQuota,
        authenticated: bool,
    ) -> Result<RateLimitDecision> {
        let limit = quota.effective_max(authenticated);
        let now = self.clock.now_ms();

        match self.strategy {
            AdmissionStrategy::Counted => self.admit_counted(key, quota, limit, now).await,
            AdmissionStrategy::Scripted => self.admit_scripted(key, quota, limit, now).await,
        }
    }

    async fn admit_counted(
        &self,
        key: &str,
        quota: &RateLimitQuota,
        limit: u32,
        now: i64,
    ) -> Result<RateLimitDecision> {
        let window_ms = quota.window_ms as i64;
        let window_start = now - window_ms;

        // Requests already inside the window, before this one is added
        let count = self.store.count_from(key, window_start).await?;

        if count >= limit as u64 {
            let oldest = self.store.oldest_score(key).await?;
            return Err(self.rejection(key, count, limit, window_ms, now, oldest));
        }

        // Register the request, garbage-collect expired entries, and
        // refresh the key TTL in one store transaction.
        self.store
            .record(key, now, window_start, quota.ttl_secs())
            .await?;

        debug!("Admitted request for key {} ({}/{})", key, count + 1, limit);

        Ok(RateLimitDecision {
            limit,
            remaining: remaining(limit, count),
            reset_secs: ceil_secs(now + window_ms),
        })
    }

    async fn admit_scripted(
        &self,
        key: &str,
        quota: &RateLimitQuota,
        limit: u32,
        now: i64,
    ) -> Result<RateLimitDecision> {
        let outcome = self
            .store
            .check_and_record(key, now, quota.window_ms, limit)
            .await?;

        let window_ms = quota.window_ms as i64;

        if !outcome.admitted {
            return Err(self.rejection(key, outcome.count, limit, window_ms, now, outcome.oldest));
        }

        debug!(
            "Admitted request for key {} ({}/{})",
            key,
            outcome.count + 1,
            limit
        );

        Ok(RateLimitDecision {
            limit,
            remaining: remaining(limit, outcome.count),
            reset_secs: ceil_secs(now + window_ms),
        })
    }

    /// Build the rejection from the oldest surviving entry: the client
    /// only needs to wait until that entry ages out of the window.
    fn rejection(
        &self,
        key: &str,
        count: u64,
        limit: u32,
        window_ms: i64,
        now: i64,
        oldest: Option<i64>,
    ) -> QuotagateError {
        warn!("Rate limit exceeded for key {} ({} in window)", key, count);

        let reset_at = oldest.unwrap_or(now) + window_ms;
        QuotagateError::RateLimitExceeded {
            retry_after_secs: ceil_secs((reset_at - now).max(0)),
            limit,
            remaining: remaining(limit, count),
            reset_secs: ceil_secs(reset_at),
        }
    }
}

fn remaining(limit: u32, count: u64) -> u32 {
    (limit as u64).saturating_sub(count) as u32
}

/// Milliseconds to whole seconds, always rounded up so a client never
/// retries too early
fn ceil_secs(ms: i64) -> u64 {
    (ms.max(0) as u64).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryWindowStore;

    fn quota(window_ms: u64, max: u32, auth_max: Option<u32>) -> RateLimitQuota {
        RateLimitQuota {
            window_ms,
            max_requests: max,
            authenticated_max_requests: auth_max,
        }
    }

    fn make_engine(strategy: AdmissionStrategy, start_ms: i64) -> (AdmissionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let engine = AdmissionEngine::new(
            Arc::new(InMemoryWindowStore::new()),
            clock.clone(),
            strategy,
        );
        (engine, clock)
    }

    #[tokio::test]
    async fn test_admits_until_limit_then_rejects() {
        for strategy in [AdmissionStrategy::Counted, AdmissionStrategy::Scripted] {
            let (engine, _clock) = make_engine(strategy, 0);
            let quota = quota(60_000, 5, None);

            for i in 0..5 {
                let decision = engine.admit("k", &quota, false).await.unwrap();
                assert_eq!(decision.limit, 5);
                assert_eq!(decision.remaining, 5 - i);
            }

            let err = engine.admit("k", &quota, false).await.unwrap_err();
            assert!(matches!(err, QuotagateError::RateLimitExceeded { .. }));
        }
    }

    #[tokio::test]
    async fn test_recovers_after_oldest_entry_expires() {
        for strategy in [AdmissionStrategy::Counted, AdmissionStrategy::Scripted] {
            let (engine, clock) = make_engine(strategy, 0);
            let quota = quota(60_000, 1, None);

            engine.admit("k", &quota, false).await.unwrap();
            assert!(engine.admit("k", &quota, false).await.is_err());

            // Oldest entry was admitted at t=0 and still sits on the
            // window boundary at t=60_000 (the count bound is inclusive);
            // one tick later it has aged out
            clock.set(60_000);
            assert!(engine.admit("k", &quota, false).await.is_err());

            clock.set(60_001);
            assert!(engine.admit("k", &quota, false).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_retry_after_values() {
        let (engine, clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(60_000, 1, None);

        engine.admit("k", &quota, false).await.unwrap();

        clock.set(1_000);
        let err = engine.admit("k", &quota, false).await.unwrap_err();
        match err {
            QuotagateError::RateLimitExceeded {
                retry_after_secs,
                limit,
                remaining,
                reset_secs,
            } => {
                // Oldest entry at t=0 + 60s window = reset at t=60s;
                // 59s left, rounded up
                assert_eq!(retry_after_secs, 59);
                assert_eq!(limit, 1);
                assert_eq!(remaining, 0);
                assert_eq!(reset_secs, 60);
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_after_rounds_up() {
        let (engine, clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(60_000, 1, None);

        engine.admit("k", &quota, false).await.unwrap();

        clock.set(500);
        let err = engine.admit("k", &quota, false).await.unwrap_err();
        match err {
            QuotagateError::RateLimitExceeded {
                retry_after_secs, ..
            } => {
                // 59.5s left must round to 60, never down to 59
                assert_eq!(retry_after_secs, 60);
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remaining_uses_pre_increment_count() {
        let (engine, _clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(60_000, 3, None);

        // First admit sees zero entries in the window
        let decision = engine.admit("k", &quota, false).await.unwrap();
        assert_eq!(decision.remaining, 3);

        let decision = engine.admit("k", &quota, false).await.unwrap();
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test]
    async fn test_reset_timestamp_on_admit() {
        let (engine, clock) = make_engine(AdmissionStrategy::Counted, 10_500);
        let quota = quota(60_000, 5, None);

        let decision = engine.admit("k", &quota, false).await.unwrap();
        // ceil((10_500 + 60_000) / 1000)
        assert_eq!(decision.reset_secs, 71);

        clock.set(12_000);
        let decision = engine.admit("k", &quota, false).await.unwrap();
        assert_eq!(decision.reset_secs, 72);
    }

    #[tokio::test]
    async fn test_authenticated_ceiling() {
        let (engine, _clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(60_000, 2, Some(4));

        // Anonymous exhausts at 2
        engine.admit("anon", &quota, false).await.unwrap();
        engine.admit("anon", &quota, false).await.unwrap();
        assert!(engine.admit("anon", &quota, false).await.is_err());

        // Authenticated subject gets 4
        for _ in 0..4 {
            engine.admit("auth", &quota, true).await.unwrap();
        }
        assert!(engine.admit("auth", &quota, true).await.is_err());
    }

    #[tokio::test]
    async fn test_separate_keys_are_independent() {
        let (engine, _clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(60_000, 1, None);

        engine.admit("a", &quota, false).await.unwrap();
        assert!(engine.admit("a", &quota, false).await.is_err());
        assert!(engine.admit("b", &quota, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_sliding_window_counts_trailing_period_only() {
        let (engine, clock) = make_engine(AdmissionStrategy::Counted, 0);
        let quota = quota(10_000, 3, None);

        engine.admit("k", &quota, false).await.unwrap(); // t=0
        clock.set(4_000);
        engine.admit("k", &quota, false).await.unwrap(); // t=4s
        clock.set(8_000);
        engine.admit("k", &quota, false).await.unwrap(); // t=8s

        clock.set(9_000);
        assert!(engine.admit("k", &quota, false).await.is_err());

        // t=11s: the t=0 entry left the window, one slot free
        clock.set(11_000);
        assert!(engine.admit("k", &quota, false).await.is_ok());
        assert!(engine.admit("k", &quota, false).await.is_err());
    }

    #[tokio::test]
    async fn test_ttl_refreshed_on_admit() {
        let store = Arc::new(InMemoryWindowStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let engine = AdmissionEngine::new(store.clone(), clock, AdmissionStrategy::Counted);

        let quota = quota(90_500, 10, None);
        engine.admit("k", &quota, false).await.unwrap();

        // ceil(90.5s)
        assert_eq!(store.ttl_secs("k"), Some(91));
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(999), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(1_001), 2);
        assert_eq!(ceil_secs(-500), 0);
    }
}
