//! Watch/cache synchronizer.
//!
//! A [`SharedInformer`] keeps a local read-through cache of [`WatchedEvent`]s: it replays an
//! initial listing from its [`ListWatch`] source, then applies the live change stream, relisting
//! whenever the stream breaks. Registered [`EventHandler`]s are told about every key it observes.

mod list_watch;
mod shared_informer;

pub use list_watch::*;
pub use shared_informer::*;


use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::LookupError;
use crate::ResourceKey;
use crate::WatchDelta;
use crate::WatchedEvent;

/// Read side of the local cache, as consumed by the controller
#[cfg_attr(test, automock)]
pub trait Synchronizer: Send + Sync + 'static {
    /// True once the initial listing has been loaded into the cache
    fn has_synced(&self) -> bool;

    /// Registers `handler` for every later change. Objects already cached are replayed to it as
    /// additions.
    fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    );

    /// Cached object for `namespace/name`.
    ///
    /// `Ok(None)` means the object is gone, which is expected under normal churn.
    fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<WatchedEvent>>, LookupError>;
}

/// Notification capability handed to the synchronizer.
///
/// Called synchronously on the synchronizer task; implementations must not block.
pub trait EventHandler: Send + Sync + 'static {
    fn on_add(
        &self,
        key: ResourceKey,
    );

    fn on_update(
        &self,
        _key: ResourceKey,
    ) {
    }

    fn on_delete(
        &self,
        _key: ResourceKey,
    ) {
    }
}

/// Control-plane boundary of the informer
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListWatch: Send + Sync + 'static {
    /// Full listing of the watched objects
    async fn list(&self) -> Result<Vec<WatchedEvent>, LookupError>;

    /// Live change stream following the last listing.
    ///
    /// The stream ending, or yielding an error, makes the informer relist.
    async fn watch(&self) -> Result<BoxStream<'static, Result<WatchDelta, LookupError>>, LookupError>;
}
