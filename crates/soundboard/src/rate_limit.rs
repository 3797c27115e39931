//! Trigger cool-downs, global and per caller.
//!
//! A trigger passes only when both the global and the caller's own cool-down
//! have elapsed since the last accepted trigger. The check and the update run
//! under one lock so two concurrent triggers cannot both slip through.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    global: Duration,
    per_caller: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    last_global: Option<Instant>,
    last_by_caller: HashMap<String, Instant>,
    last_sweep: Option<Instant>,
}

impl RateLimiter {
    pub fn new(global: Duration, per_caller: Duration) -> Self {
        Self {
            global,
            per_caller,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Whether a trigger from `caller` would be accepted now. Does not record anything.
    pub fn check(&self, caller: &str) -> bool {
        self.check_at(caller, Instant::now())
    }

    /// Record an accepted trigger from `caller` now.
    pub fn record(&self, caller: &str) {
        self.record_at(caller, Instant::now());
    }

    /// Check and, if allowed, record in one step. Returns whether the trigger was accepted.
    pub fn check_and_record(&self, caller: &str) -> bool {
        self.check_and_record_at(caller, Instant::now())
    }

    /// Number of callers currently remembered.
    pub fn tracked_callers(&self) -> usize {
        self.lock().last_by_caller.len()
    }

    pub(crate) fn check_at(&self, caller: &str, now: Instant) -> bool {
        self.allowed(&self.lock(), caller, now)
    }

    pub(crate) fn record_at(&self, caller: &str, now: Instant) {
        let mut state = self.lock();
        self.store(&mut state, caller, now);
    }

    pub(crate) fn check_and_record_at(&self, caller: &str, now: Instant) -> bool {
        let mut state = self.lock();
        if !self.allowed(&state, caller, now) {
            return false;
        }
        self.store(&mut state, caller, now);
        true
    }

    fn allowed(&self, state: &LimiterState, caller: &str, now: Instant) -> bool {
        let elapsed = |last: Option<&Instant>, threshold: Duration| match last {
            Some(last) => now.saturating_duration_since(*last) >= threshold,
            None => true,
        };
        elapsed(state.last_global.as_ref(), self.global)
            && elapsed(state.last_by_caller.get(caller), self.per_caller)
    }

    fn store(&self, state: &mut LimiterState, caller: &str, now: Instant) {
        state.last_global = Some(now);
        state.last_by_caller.insert(caller.to_string(), now);
        self.sweep(state, now);
    }

    /// Forget callers whose cool-down has fully elapsed; they behave exactly
    /// like callers never seen. Runs at most once per per-caller cool-down.
    fn sweep(&self, state: &mut LimiterState, now: Instant) {
        let due = state
            .last_sweep
            .map(|last| now.saturating_duration_since(last) >= self.per_caller)
            .unwrap_or(true);
        if !due {
            return;
        }
        let before = state.last_by_caller.len();
        let per_caller = self.per_caller;
        state
            .last_by_caller
            .retain(|_, last| now.saturating_duration_since(*last) < per_caller);
        state.last_sweep = Some(now);
        let evicted = before - state.last_by_caller.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = state.last_by_caller.len(), "rate limit sweep");
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn global_cooldown_scenario() {
        let limiter = RateLimiter::new(ms(2_000), Duration::ZERO);
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("alice", t0));
        assert!(!limiter.check_and_record_at("bob", t0 + ms(500)));
        assert!(limiter.check_and_record_at("bob", t0 + ms(2_100)));
    }

    #[test]
    fn global_cooldown_boundary_is_inclusive() {
        let limiter = RateLimiter::new(ms(2_000), Duration::ZERO);
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("a", t0));
        assert!(!limiter.check_at("b", t0 + ms(1_999)));
        assert!(limiter.check_at("b", t0 + ms(2_000)));
    }

    #[test]
    fn per_caller_cooldown_is_independent() {
        let limiter = RateLimiter::new(ms(100), ms(1_000));
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("alice", t0));
        assert!(limiter.check_and_record_at("bob", t0 + ms(200)));
        assert!(!limiter.check_and_record_at("alice", t0 + ms(500)));
        assert!(limiter.check_and_record_at("alice", t0 + ms(1_000)));
    }

    #[test]
    fn rejection_does_not_record() {
        let limiter = RateLimiter::new(ms(1_000), Duration::ZERO);
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("a", t0));
        assert!(!limiter.check_and_record_at("a", t0 + ms(900)));
        // The rejected attempt must not push the window out.
        assert!(limiter.check_and_record_at("a", t0 + ms(1_000)));
    }

    #[test]
    fn check_alone_does_not_record() {
        let limiter = RateLimiter::new(ms(1_000), ms(1_000));
        let t0 = Instant::now();
        assert!(limiter.check_at("a", t0));
        assert!(limiter.check_at("a", t0 + ms(1)));
        limiter.record_at("a", t0 + ms(2));
        assert!(!limiter.check_at("a", t0 + ms(3)));
    }

    #[test]
    fn idle_callers_are_evicted() {
        let limiter = RateLimiter::new(Duration::ZERO, ms(1_000));
        let t0 = Instant::now();
        for i in 0..50 {
            assert!(limiter.check_and_record_at(&format!("user{i}"), t0));
        }
        assert_eq!(limiter.tracked_callers(), 50);

        assert!(limiter.check_and_record_at("late", t0 + ms(1_500)));
        assert_eq!(limiter.tracked_callers(), 1);
        assert!(limiter.check_at("user0", t0 + ms(1_500)));
    }

    #[test]
    fn eviction_keeps_callers_still_cooling_down() {
        let limiter = RateLimiter::new(Duration::ZERO, ms(1_000));
        let t0 = Instant::now();
        assert!(limiter.check_and_record_at("old", t0));
        assert!(limiter.check_and_record_at("recent", t0 + ms(900)));
        assert!(limiter.check_and_record_at("late", t0 + ms(1_100)));
        assert!(!limiter.check_at("recent", t0 + ms(1_100)));
        assert_eq!(limiter.tracked_callers(), 2);
    }

    #[test]
    fn concurrent_triggers_admit_exactly_one() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_and_record("same"))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
