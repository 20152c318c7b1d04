use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::EventType;
use crate::ObjectReference;
use crate::WatchDelta;
use crate::WatchedEvent;

/// Builds pod events with sensible defaults
pub struct EventBuilder {
    event: WatchedEvent,
}

impl EventBuilder {
    pub fn new(
        namespace: &str,
        name: &str,
    ) -> Self {
        let mut event = WatchedEvent::new(namespace, name, Utc::now());
        event.uid = format!("uid-{namespace}-{name}");
        event.involved_object = ObjectReference {
            kind: "Pod".to_string(),
            namespace: namespace.to_string(),
            name: name.split('.').next().unwrap_or(name).to_string(),
        };
        event.reason = "Scheduled".to_string();
        event.message = format!("Successfully assigned {namespace}/{name}");
        Self { event }
    }

    pub fn created_at(
        mut self,
        timestamp: DateTime<Utc>,
    ) -> Self {
        self.event.creation_timestamp = timestamp;
        self
    }

    /// Created `age` before now
    pub fn aged(
        self,
        age: Duration,
    ) -> Self {
        self.created_at(Utc::now() - age)
    }

    pub fn warning(
        mut self,
        reason: &str,
        message: &str,
    ) -> Self {
        self.event.event_type = EventType::Warning;
        self.event.reason = reason.to_string();
        self.event.message = message.to_string();
        self
    }

    pub fn count(
        mut self,
        count: u32,
    ) -> Self {
        self.event.count = count;
        self
    }

    pub fn build(self) -> WatchedEvent {
        self.event
    }

    pub fn added(self) -> WatchDelta {
        WatchDelta::Added(self.event)
    }

    pub fn modified(self) -> WatchDelta {
        WatchDelta::Modified(self.event)
    }

    pub fn deleted(self) -> WatchDelta {
        WatchDelta::Deleted(self.event)
    }
}
