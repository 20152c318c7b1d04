//! Controller Error Hierarchy
//!
//! Two families of errors live here:
//! - process-level [`Error`]s, which only occur during startup (configuration, cache sync,
//!   observability setup) and stop the process;
//! - per-item [`ReconcileError`]s, which are raised while reconciling a single key and are always
//!   handled inside the worker loop (logged, then retried or forgotten).

use std::time::Duration;

use config::ConfigError;

use crate::ResourceKey;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Initial cache synchronization did not complete before cancellation
    #[error("Timed out waiting for caches to sync after {waited:?}")]
    CacheSyncTimeout { waited: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Watch/cache synchronizer gave up (bounded relist policy exhausted)
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Malformed event payloads from a local source (snapshot file, stdin replay)
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Key could not be split into namespace and name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource key: {0:?}")]
pub struct MalformedKey(pub String);

/// Failures reported by the watch/cache synchronizer or its list/watch source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Cache has not completed its initial listing yet
    #[error("cache is not synced yet")]
    NotSynced,

    /// Control-plane listing or watch failure
    #[error("source error: {0}")]
    Source(String),

    /// Watch stream can not be (re)opened
    #[error("watch stream closed")]
    WatchClosed,

    /// A list or watch call did not answer in time
    #[error("source call timed out")]
    Timeout,
}

impl From<tokio::time::error::Elapsed> for LookupError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LookupError::Timeout
    }
}

/// Failures reported by a notification sink. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The sink received the alert but refused it
    #[error("notification rejected: {0}")]
    Rejected(String),

    /// The sink could not be reached
    #[error("notification transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    MalformedKey(#[from] MalformedKey),

    /// Object is gone from the cache; expected under normal churn
    #[error("{key} in work queue no longer exists")]
    NotFound { key: ResourceKey },

    #[error("failed to look up {key}: {source}")]
    Lookup {
        key: ResourceKey,
        #[source]
        source: LookupError,
    },

    #[error("failed to dispatch {key}: {source}")]
    Dispatch {
        key: ResourceKey,
        #[source]
        source: DispatchError,
    },
}

impl ReconcileError {
    /// Retryable errors are re-added with backoff; the others are forgotten.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::Lookup { .. } | ReconcileError::Dispatch { .. }
        )
    }
}
