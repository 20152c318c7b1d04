use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Work queue backoff and rate limits
///
/// Per-key delay is `min(max_delay_ms, base_delay_ms * 2^failures)`; the optional token bucket
/// additionally caps the overall enqueue rate.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// A failing key is dropped once its requeue count reaches this value (0 means unlimited
    /// retries). The rate limited add on observation counts as the first requeue.
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_bucket_enabled")]
    pub bucket_enabled: bool,

    /// Steady enqueue rate of the overall bucket (unit: items per second)
    #[serde(default = "default_bucket_qps")]
    pub bucket_qps: u32,

    /// Items allowed above the steady rate
    #[serde(default = "default_bucket_burst")]
    pub bucket_burst: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: 0,
            bucket_enabled: default_bucket_enabled(),
            bucket_qps: default_bucket_qps(),
            bucket_burst: default_bucket_burst(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::InvalidConfig("queue.base_delay_ms cannot be 0".into()));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "queue.max_delay_ms ({}) must be >= queue.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }

        if self.bucket_enabled && (self.bucket_qps == 0 || self.bucket_burst == 0) {
            return Err(Error::InvalidConfig(
                "queue.bucket_qps and queue.bucket_burst must be > 0 when the bucket is enabled"
                    .into(),
            ));
        }

        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_base_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    // 1000s
    1_000_000
}
fn default_bucket_enabled() -> bool {
    true
}
fn default_bucket_qps() -> u32 {
    10
}
fn default_bucket_burst() -> u32 {
    100
}
