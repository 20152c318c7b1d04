use async_trait::async_trait;
use tracing::info;
use tracing::warn;

use super::Notifier;
use crate::DispatchError;
use crate::EventType;
use crate::NotifierConfig;
use crate::WatchedEvent;

/// Sink that writes alerts to the log, tagged with the configured channel
pub struct LogNotifier {
    channel: String,
}

impl LogNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            channel: config.channel.clone(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(
        &self,
        event: &WatchedEvent,
    ) -> Result<(), DispatchError> {
        let alert = format_alert(event);
        match event.event_type {
            EventType::Normal => info!(channel = %self.channel, key = %event.key(), "{}", alert),
            EventType::Warning => warn!(channel = %self.channel, key = %event.key(), "{}", alert),
        }
        Ok(())
    }
}

/// One-line rendering of an event:
/// `[Warning] BackOff Pod default/web-1: Back-off restarting failed container (x3)`
pub fn format_alert(event: &WatchedEvent) -> String {
    let severity = match event.event_type {
        EventType::Normal => "Normal",
        EventType::Warning => "Warning",
    };
    let object = &event.involved_object;
    let subject = if object.name.is_empty() {
        format!("{}/{}", event.namespace, event.name)
    } else {
        let namespace = if object.namespace.is_empty() {
            &event.namespace
        } else {
            &object.namespace
        };
        let kind = if object.kind.is_empty() { "Object" } else { &object.kind };
        format!("{} {}/{}", kind, namespace, object.name)
    };

    let mut alert = format!("[{}] {} {}: {}", severity, event.reason, subject, event.message);
    if event.count > 1 {
        alert.push_str(&format!(" (x{})", event.count));
    }
    if let Some(source) = &event.source {
        alert.push_str(&format!(" from {source}"));
    }
    alert
}
