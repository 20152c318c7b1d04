use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Watch/cache synchronizer settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InformerConfig {
    /// Backoff applied between relists after the watch stream breaks
    #[serde(default = "default_relist_policy")]
    pub relist: BackoffPolicy,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            relist: default_relist_policy(),
        }
    }
}

impl InformerConfig {
    pub fn validate(&self) -> Result<()> {
        self.relist
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("informer.relist: {e}")))
    }
}

fn default_relist_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        timeout_ms: 10_000,
        base_delay_ms: 1_000,
        max_delay_ms: 30_000,
    }
}
