use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Alerting sink target
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Channel the alerts are posted to
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

impl NotifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(Error::InvalidConfig("notifier.channel cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_channel() -> String {
    "convoyk8s".to_string()
}
