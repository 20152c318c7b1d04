//! Alerting sinks.
//!
//! The controller hands every fresh event to a [`Notifier`]. Any error it returns is treated as
//! transient: the key is re-enqueued with backoff.

mod log_notifier;

pub use log_notifier::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::DispatchError;
use crate::WatchedEvent;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Delivers one alert for `event`.
    ///
    /// Called at least once per fresh event; implementations should tolerate duplicates.
    async fn dispatch(
        &self,
        event: &WatchedEvent,
    ) -> Result<(), DispatchError>;
}
