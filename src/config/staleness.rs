use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Stale event policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StalenessConfig {
    /// Drop events created before the controller started
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Moves the reference instant back from the start time (unit: milliseconds)
    #[serde(default)]
    pub lookback_ms: u64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lookback_ms: 0,
        }
    }
}

impl StalenessConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_millis(self.lookback_ms)
    }
}

fn default_enabled() -> bool {
    true
}
