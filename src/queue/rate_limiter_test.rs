use std::num::NonZeroU32;
use std::time::Duration;

use super::*;
use crate::QueueConfig;
use crate::ResourceKey;

fn key(raw: &str) -> ResourceKey {
    ResourceKey::from(raw)
}

#[test]
fn test_exponential_delay_doubles_per_failure() {
    let limiter =
        ExponentialFailureRateLimiter::new(Duration::from_millis(5), Duration::from_secs(1000));
    let k = key("ns/foo");

    assert_eq!(limiter.when(&k), Duration::from_millis(5));
    assert_eq!(limiter.when(&k), Duration::from_millis(10));
    assert_eq!(limiter.when(&k), Duration::from_millis(20));
    assert_eq!(limiter.num_requeues(&k), 3);
}

#[test]
fn test_exponential_delay_is_monotonic_and_capped() {
    let max = Duration::from_millis(300);
    let limiter = ExponentialFailureRateLimiter::new(Duration::from_millis(10), max);
    let k = key("ns/foo");

    let mut previous = Duration::ZERO;
    for _ in 0..200 {
        let delay = limiter.when(&k);
        assert!(delay >= previous, "delay must never shrink");
        assert!(delay <= max, "delay must never exceed the cap");
        previous = delay;
    }
    assert_eq!(previous, max);
}

#[test]
fn test_backoff_does_not_overflow_for_huge_failure_counts() {
    let limiter =
        ExponentialFailureRateLimiter::new(Duration::from_millis(5), Duration::from_secs(1000));

    assert_eq!(limiter.backoff(u32::MAX), Duration::from_secs(1000));
}

#[test]
fn test_failures_are_tracked_per_key() {
    let limiter =
        ExponentialFailureRateLimiter::new(Duration::from_millis(5), Duration::from_secs(1));
    let failing = key("ns/failing");
    let healthy = key("ns/healthy");

    limiter.when(&failing);
    limiter.when(&failing);
    limiter.when(&failing);

    assert_eq!(limiter.when(&healthy), Duration::from_millis(5));
    assert_eq!(limiter.num_requeues(&failing), 3);
    assert_eq!(limiter.num_requeues(&healthy), 1);
}

#[test]
fn test_forget_resets_backoff() {
    let limiter =
        ExponentialFailureRateLimiter::new(Duration::from_millis(5), Duration::from_secs(1));
    let k = key("ns/foo");

    limiter.when(&k);
    limiter.when(&k);
    limiter.forget(&k);

    assert_eq!(limiter.num_requeues(&k), 0);
    assert!(limiter.failures.get(&k).is_none());
    assert_eq!(limiter.when(&k), Duration::from_millis(5));
}

#[test]
fn test_bucket_allows_burst_then_delays() {
    let limiter = BucketRateLimiter::new(NonZeroU32::new(1).unwrap(), NonZeroU32::new(3).unwrap());
    let k = key("ns/foo");

    for _ in 0..3 {
        assert_eq!(limiter.when(&k), Duration::ZERO);
    }
    let delay = limiter.when(&k);
    assert!(delay > Duration::ZERO);
    assert!(delay <= Duration::from_secs(1));
    assert_eq!(limiter.num_requeues(&k), 0);
}

#[test]
fn test_max_of_returns_largest_member_delay() {
    let mut fast = MockRateLimiter::new();
    fast.expect_when().returning(|_| Duration::from_millis(5));
    let mut slow = MockRateLimiter::new();
    slow.expect_when().returning(|_| Duration::from_millis(50));

    let limiter = MaxOfRateLimiter::new(vec![Box::new(fast), Box::new(slow)]);

    assert_eq!(limiter.when(&key("ns/foo")), Duration::from_millis(50));
}

#[test]
fn test_max_of_fans_out_forget_and_reports_max_requeues() {
    let mut first = MockRateLimiter::new();
    first.expect_forget().times(1).returning(|_| ());
    first.expect_num_requeues().returning(|_| 2);
    let mut second = MockRateLimiter::new();
    second.expect_forget().times(1).returning(|_| ());
    second.expect_num_requeues().returning(|_| 0);

    let limiter = MaxOfRateLimiter::new(vec![Box::new(first), Box::new(second)]);
    let k = key("ns/foo");

    limiter.forget(&k);
    assert_eq!(limiter.num_requeues(&k), 2);
}

#[test]
fn test_default_controller_rate_limiter_starts_at_base_delay() {
    let config = QueueConfig::default();
    let limiter = default_controller_rate_limiter(&config);
    let k = key("default/pod-a");

    assert_eq!(limiter.when(&k), config.base_delay());
    assert_eq!(limiter.when(&k), config.base_delay() * 2);
    assert_eq!(limiter.num_requeues(&k), 2);
}

#[test]
fn test_default_controller_rate_limiter_without_bucket() {
    let config = QueueConfig {
        bucket_enabled: false,
        base_delay_ms: 7,
        ..QueueConfig::default()
    };
    let limiter = default_controller_rate_limiter(&config);

    assert_eq!(limiter.when(&key("ns/foo")), Duration::from_millis(7));
}
