use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::ListWatch;
use crate::LookupError;
use crate::ResourceKey;
use crate::WatchDelta;
use crate::WatchedEvent;

/// Buffered deltas before senders have to wait
const DELTA_CHANNEL_CAPACITY: usize = 1024;

/// In-process [`ListWatch`] fed through a channel of deltas.
///
/// Deltas that went through the watch stream are folded into the listing, so a relist after the
/// stream breaks sees the same state the informer last did. The delta receiver can only be handed
/// out once; later `watch` calls return a stream that never yields.
pub struct ChannelListWatch {
    objects: Arc<Mutex<BTreeMap<ResourceKey, WatchedEvent>>>,
    deltas: Mutex<Option<mpsc::Receiver<WatchDelta>>>,
}

impl ChannelListWatch {
    pub fn new(initial: Vec<WatchedEvent>) -> (Self, mpsc::Sender<WatchDelta>) {
        let (tx, rx) = mpsc::channel(DELTA_CHANNEL_CAPACITY);
        let objects = initial.into_iter().map(|event| (event.key(), event)).collect();
        (
            Self {
                objects: Arc::new(Mutex::new(objects)),
                deltas: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

fn apply(
    objects: &Mutex<BTreeMap<ResourceKey, WatchedEvent>>,
    delta: &WatchDelta,
) {
    let mut objects = objects.lock();
    match delta {
        WatchDelta::Added(event) | WatchDelta::Modified(event) => {
            objects.insert(event.key(), event.clone());
        }
        WatchDelta::Deleted(event) => {
            objects.remove(&event.key());
        }
    }
}

#[async_trait]
impl ListWatch for ChannelListWatch {
    async fn list(&self) -> Result<Vec<WatchedEvent>, LookupError> {
        Ok(self.objects.lock().values().cloned().collect())
    }

    async fn watch(&self) -> Result<BoxStream<'static, Result<WatchDelta, LookupError>>, LookupError> {
        let receiver = self.deltas.lock().take();
        match receiver {
            Some(rx) => {
                let objects = self.objects.clone();
                Ok(ReceiverStream::new(rx)
                    .map(move |delta| {
                        apply(&objects, &delta);
                        Ok(delta)
                    })
                    .boxed())
            }
            None => {
                debug!("delta channel already consumed, watching nothing");
                Ok(stream::pending().boxed())
            }
        }
    }
}
