use std::time::Duration;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;

use crate::StalenessConfig;
use crate::WatchedEvent;

/// Drops events created before a reference instant fixed at startup.
///
/// Control-plane timestamps carry whole seconds, so the comparison is done at second
/// granularity: an event created in the same second as the reference is fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessFilter {
    reference: Option<DateTime<Utc>>,
}

impl StalenessFilter {
    /// Events created before `start - lookback` are stale
    pub fn since(
        start: DateTime<Utc>,
        lookback: Duration,
    ) -> Self {
        let reference = TimeDelta::from_std(lookback)
            .ok()
            .and_then(|lookback| start.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            reference: Some(reference),
        }
    }

    /// Every event is fresh
    pub fn disabled() -> Self {
        Self { reference: None }
    }

    pub fn from_config(
        config: &StalenessConfig,
        start: DateTime<Utc>,
    ) -> Self {
        if config.enabled {
            Self::since(start, config.lookback())
        } else {
            Self::disabled()
        }
    }

    pub fn reference(&self) -> Option<DateTime<Utc>> {
        self.reference
    }

    pub fn is_stale(
        &self,
        event: &WatchedEvent,
    ) -> bool {
        self.reference
            .map(|reference| event.creation_timestamp.timestamp() < reference.timestamp())
            .unwrap_or(false)
    }
}
