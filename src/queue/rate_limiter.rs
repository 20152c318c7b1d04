use std::num::NonZeroU32;
use std::time::Duration;

use dashmap::DashMap;
use governor::clock::Clock;
use governor::clock::DefaultClock;
use governor::DefaultDirectRateLimiter;
use governor::Quota;
#[cfg(test)]
use mockall::automock;

use crate::QueueConfig;
use crate::ResourceKey;

/// Decides how long a key waits before it is (re)delivered.
#[cfg_attr(test, automock)]
pub trait RateLimiter: Send + Sync + 'static {
    /// Delay for the next delivery of `key`. Records one more failure for it.
    fn when(
        &self,
        key: &ResourceKey,
    ) -> Duration;

    /// Stops tracking `key`; its next delay is computed as for a fresh key.
    fn forget(
        &self,
        key: &ResourceKey,
    );

    /// Number of failures recorded for `key` since the last `forget`.
    fn num_requeues(
        &self,
        key: &ResourceKey,
    ) -> u32;
}

/// Per-key exponential backoff: `min(max_delay, base_delay * 2^failures)`.
pub struct ExponentialFailureRateLimiter {
    base_delay: Duration,
    max_delay: Duration,
    pub(crate) failures: DashMap<ResourceKey, u32>,
}

impl ExponentialFailureRateLimiter {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: DashMap::new(),
        }
    }

    pub(crate) fn backoff(
        &self,
        failures: u32,
    ) -> Duration {
        // 2^127 already saturates any realistic base delay
        let factor = 1u128 << failures.min(127);
        let nanos = self
            .base_delay
            .as_nanos()
            .saturating_mul(factor)
            .min(self.max_delay.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl RateLimiter for ExponentialFailureRateLimiter {
    fn when(
        &self,
        key: &ResourceKey,
    ) -> Duration {
        let failures = {
            let mut count = self.failures.entry(key.clone()).or_insert(0);
            let current = *count;
            *count = count.saturating_add(1);
            current
        };
        self.backoff(failures)
    }

    fn forget(
        &self,
        key: &ResourceKey,
    ) {
        self.failures.remove(key);
    }

    fn num_requeues(
        &self,
        key: &ResourceKey,
    ) -> u32 {
        self.failures.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Overall token bucket shared by all keys.
///
/// Only limits the aggregate enqueue rate; it keeps no per-key state.
pub struct BucketRateLimiter {
    limiter: DefaultDirectRateLimiter,
    clock: DefaultClock,
}

impl BucketRateLimiter {
    pub fn new(
        qps: NonZeroU32,
        burst: NonZeroU32,
    ) -> Self {
        Self {
            limiter: DefaultDirectRateLimiter::direct(Quota::per_second(qps).allow_burst(burst)),
            clock: DefaultClock::default(),
        }
    }
}

impl RateLimiter for BucketRateLimiter {
    fn when(
        &self,
        _key: &ResourceKey,
    ) -> Duration {
        match self.limiter.check() {
            Ok(()) => Duration::ZERO,
            Err(not_until) => not_until.wait_time_from(self.clock.now()),
        }
    }

    fn forget(
        &self,
        _key: &ResourceKey,
    ) {
    }

    fn num_requeues(
        &self,
        _key: &ResourceKey,
    ) -> u32 {
        0
    }
}

/// Combines limiters by taking the worst (largest) answer of its members.
pub struct MaxOfRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(
        &self,
        key: &ResourceKey,
    ) -> Duration {
        // Every member must observe the failure, so no short-circuiting here
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .fold(Duration::ZERO, Duration::max)
    }

    fn forget(
        &self,
        key: &ResourceKey,
    ) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(
        &self,
        key: &ResourceKey,
    ) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key exponential backoff combined with the overall bucket (when enabled).
pub fn default_controller_rate_limiter(config: &QueueConfig) -> Box<dyn RateLimiter> {
    let exponential: Box<dyn RateLimiter> = Box::new(ExponentialFailureRateLimiter::new(
        config.base_delay(),
        config.max_delay(),
    ));

    let bucket = NonZeroU32::new(config.bucket_qps)
        .zip(NonZeroU32::new(config.bucket_burst))
        .filter(|_| config.bucket_enabled);

    match bucket {
        Some((qps, burst)) => Box::new(MaxOfRateLimiter::new(vec![
            exponential,
            Box::new(BucketRateLimiter::new(qps, burst)),
        ])),
        None => exponential,
    }
}
