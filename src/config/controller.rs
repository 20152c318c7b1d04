use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Worker pool and startup gate settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Number of reconcile workers pulling from the shared queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound for the initial cache sync (unit: milliseconds, 0 means wait until
    /// cancelled)
    #[serde(default)]
    pub cache_sync_timeout_ms: u64,

    /// How often the startup gate polls the synchronizer (unit: milliseconds)
    #[serde(default = "default_cache_sync_poll_interval_ms")]
    pub cache_sync_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_sync_timeout_ms: 0,
            cache_sync_poll_interval_ms: default_cache_sync_poll_interval_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("controller.workers must be at least 1".into()));
        }

        if self.cache_sync_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "controller.cache_sync_poll_interval_ms cannot be 0".into(),
            ));
        }

        Ok(())
    }

    pub fn cache_sync_timeout(&self) -> Option<Duration> {
        (self.cache_sync_timeout_ms > 0).then(|| Duration::from_millis(self.cache_sync_timeout_ms))
    }

    pub fn cache_sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sync_poll_interval_ms)
    }
}

fn default_workers() -> usize {
    1
}
fn default_cache_sync_poll_interval_ms() -> u64 {
    100
}
