use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::ResourceKey;

/// Severity reported by the control plane for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    Normal,
    Warning,
}

/// The object an event is about
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// Snapshot of a control-plane event object as held by the local cache.
///
/// Workers only ever read it; the cache owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedEvent {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub involved_object: ObjectReference,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub event_type: EventType,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WatchedEvent {
    pub fn new(
        namespace: &str,
        name: &str,
        creation_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            uid: String::new(),
            creation_timestamp,
            involved_object: ObjectReference::default(),
            reason: String::new(),
            message: String::new(),
            event_type: EventType::Normal,
            count: default_count(),
            source: None,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.namespace, &self.name)
    }
}

fn default_count() -> u32 {
    1
}

/// One item of the live change stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "object")]
pub enum WatchDelta {
    Added(WatchedEvent),
    Modified(WatchedEvent),
    Deleted(WatchedEvent),
}

impl WatchDelta {
    pub fn object(&self) -> &WatchedEvent {
        match self {
            WatchDelta::Added(event) | WatchDelta::Modified(event) | WatchDelta::Deleted(event) => {
                event
            }
        }
    }
}
