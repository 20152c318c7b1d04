use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::EventHandler;
use super::ListWatch;
use super::Synchronizer;
use crate::async_task::task_with_timeout_and_exponential_backoff;
use crate::async_task::with_jitter;
use crate::BackoffPolicy;
use crate::InformerConfig;
use crate::LookupError;
use crate::ResourceKey;
use crate::Result;
use crate::WatchDelta;
use crate::WatchedEvent;

/// Local cache of watched objects kept in sync with a [`ListWatch`] source.
pub struct SharedInformer<L> {
    list_watch: L,
    store: DashMap<ResourceKey, Arc<WatchedEvent>>,
    synced: AtomicBool,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    relist: BackoffPolicy,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Added,
    Updated,
    Deleted,
}

impl<L: ListWatch> SharedInformer<L> {
    pub fn new(
        list_watch: L,
        config: &InformerConfig,
    ) -> Self {
        Self {
            list_watch,
            store: DashMap::new(),
            synced: AtomicBool::new(false),
            handlers: RwLock::new(Vec::new()),
            relist: config.relist,
        }
    }

    /// Number of cached objects
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Lists, marks the cache synced, then follows the watch stream until `shutdown` is
    /// cancelled. A broken stream triggers a relist after a backoff.
    ///
    /// Only returns an error when a bounded relist policy runs out of attempts.
    pub async fn run(
        &self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("informer started");
        let mut breaks: u32 = 0;

        loop {
            let listed = tokio::select! {
                _ = shutdown.cancelled() => break,
                listed = self.list_with_backoff() => listed?,
            };
            self.replace(listed);

            let watch = tokio::select! {
                _ = shutdown.cancelled() => break,
                watch = self.list_watch.watch() => watch,
            };
            match watch {
                Ok(mut stream) => {
                    loop {
                        let item = tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("informer stopped");
                                return Ok(());
                            }
                            item = stream.next() => item,
                        };
                        match item {
                            Some(Ok(delta)) => {
                                breaks = 0;
                                self.apply(delta);
                            }
                            Some(Err(e)) => {
                                warn!("watch stream failed: {}", e);
                                break;
                            }
                            None => {
                                debug!("watch stream ended");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("could not open watch stream: {}", e),
            }

            let delay = with_jitter(self.relist.delay_for(breaks));
            breaks = breaks.saturating_add(1);
            debug!(?delay, "relisting after watch interruption");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        info!("informer stopped");
        Ok(())
    }

    /// Runs the informer on its own task. Giving up cancels `shutdown` so the rest of the
    /// process stops with it; the error comes back through the handle.
    pub fn spawn(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let result = self.run(shutdown.clone()).await;
            if let Err(e) = &result {
                error!("informer gave up: {:?}", e);
                shutdown.cancel();
            }
            result
        })
    }

    async fn list_with_backoff(&self) -> std::result::Result<Vec<WatchedEvent>, LookupError> {
        task_with_timeout_and_exponential_backoff(|| self.list_watch.list(), self.relist).await
    }

    /// Swaps the cache content for a full listing
    fn replace(
        &self,
        listed: Vec<WatchedEvent>,
    ) {
        let mut changes = Vec::with_capacity(listed.len());
        let mut seen = HashSet::with_capacity(listed.len());

        for event in listed {
            let key = event.key();
            seen.insert(key.clone());
            let change = match self.store.insert(key.clone(), Arc::new(event)) {
                Some(_) => Change::Updated,
                None => Change::Added,
            };
            changes.push((key, change));
        }

        let gone: Vec<ResourceKey> = self
            .store
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for key in gone {
            self.store.remove(&key);
            changes.push((key, Change::Deleted));
        }

        if !self.synced.swap(true, Ordering::AcqRel) {
            info!(objects = self.store.len(), "informer cache synced");
        }
        self.notify(changes);
    }

    fn apply(
        &self,
        delta: WatchDelta,
    ) {
        trace!(?delta, "applying watch delta");
        let change = match delta {
            WatchDelta::Added(event) | WatchDelta::Modified(event) => {
                let key = event.key();
                match self.store.insert(key.clone(), Arc::new(event)) {
                    Some(_) => (key, Change::Updated),
                    None => (key, Change::Added),
                }
            }
            WatchDelta::Deleted(event) => {
                let key = event.key();
                if self.store.remove(&key).is_none() {
                    return;
                }
                (key, Change::Deleted)
            }
        };
        self.notify(vec![change]);
    }

    fn notify(
        &self,
        changes: Vec<(ResourceKey, Change)>,
    ) {
        if changes.is_empty() {
            return;
        }
        let handlers = self.handlers.read().clone();
        for (key, change) in changes {
            for handler in &handlers {
                match change {
                    Change::Added => handler.on_add(key.clone()),
                    Change::Updated => handler.on_update(key.clone()),
                    Change::Deleted => handler.on_delete(key.clone()),
                }
            }
        }
    }
}

impl<L: ListWatch> Synchronizer for SharedInformer<L> {
    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    ) {
        let existing: Vec<ResourceKey> = {
            let mut handlers = self.handlers.write();
            handlers.push(handler.clone());
            self.store.iter().map(|entry| entry.key().clone()).collect()
        };
        for key in existing {
            handler.on_add(key);
        }
    }

    fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<Option<Arc<WatchedEvent>>, LookupError> {
        if !self.has_synced() {
            return Err(LookupError::NotSynced);
        }
        let key = ResourceKey::new(namespace, name);
        Ok(self.store.get(&key).map(|entry| entry.value().clone()))
    }
}
