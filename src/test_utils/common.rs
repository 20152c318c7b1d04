use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::EventHandler;
use crate::ResourceKey;
use crate::Synchronizer;
use crate::WatchedEvent;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Records every notification it receives, in order
#[derive(Default)]
pub struct RecordingHandler {
    pub added: Mutex<Vec<ResourceKey>>,
    pub updated: Mutex<Vec<ResourceKey>>,
    pub deleted: Mutex<Vec<ResourceKey>>,
}

impl EventHandler for RecordingHandler {
    fn on_add(
        &self,
        key: ResourceKey,
    ) {
        self.added.lock().push(key);
    }

    fn on_update(
        &self,
        key: ResourceKey,
    ) {
        self.updated.lock().push(key);
    }

    fn on_delete(
        &self,
        key: ResourceKey,
    ) {
        self.deleted.lock().push(key);
    }
}

/// Synchronizer over a fixed map, synced from the start
#[derive(Default)]
pub struct StaticSynchronizer {
    objects: HashMap<ResourceKey, Arc<WatchedEvent>>,
    handlers: Mutex<Vec<Arc<dyn EventHandler>>>,
}

impl StaticSynchronizer {
    pub fn new(events: Vec<WatchedEvent>) -> Self {
        Self {
            objects: events
                .into_iter()
                .map(|event| (event.key(), Arc::new(event)))
                .collect(),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Tells every registered handler about `key`
    pub fn observe(
        &self,
        key: ResourceKey,
    ) {
        for handler in self.handlers.lock().iter() {
            handler.on_add(key.clone());
        }
    }
}

impl Synchronizer for StaticSynchronizer {
    fn has_synced(&self) -> bool {
        true
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    ) {
        self.handlers.lock().push(handler);
    }

    fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<WatchedEvent>>, crate::LookupError> {
        Ok(self.objects.get(&ResourceKey::new(namespace, name)).cloned())
    }
}
