//! Agent-side token bucket (`send_rate_eps`, §4.3, §5). Broker-side
//! admission is inflight-based, not rate-based — this is the only rate
//! limiter in the system.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter as GovernorLimiter};

type Limiter = GovernorLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct TokenBucket {
    inner: Option<Limiter>,
}

impl TokenBucket {
    /// `eps == 0` means unbounded, matching the config default (§4.3).
    pub fn new(eps: u32) -> Self {
        let inner = NonZeroU32::new(eps).map(|n| GovernorLimiter::direct(Quota::per_second(n)));
        Self { inner }
    }

    /// Non-blocking check: `submit` never waits unboundedly on this (§4.3
    /// "non-blocking beyond the local rate-limit wait").
    pub fn try_acquire(&self) -> bool {
        match &self.inner {
            None => true,
            Some(limiter) => limiter.check().is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_always_allows() {
        let bucket = TokenBucket::new(0);
        for _ in 0..1000 {
            assert!(bucket.try_acquire());
        }
    }

    #[test]
    fn bounded_eventually_denies_burst() {
        let bucket = TokenBucket::new(1);
        let mut denied = false;
        for _ in 0..10 {
            if !bucket.try_acquire() {
                denied = true;
                break;
            }
        }
        assert!(denied, "a 1eps bucket should deny within a tight burst");
    }
}
