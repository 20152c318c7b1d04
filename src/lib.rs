//! convoy: a reconciliation controller that forwards fresh cluster events to an alerting sink.
//!
//! Pipeline: a [`SharedInformer`] keeps a local cache of [`WatchedEvent`]s and reports every
//! observed key to the [`Controller`], which pushes it through a [`RateLimitingQueue`]. A fixed
//! pool of workers resolves each key against the cache, drops stale events and hands fresh ones
//! to a [`Notifier`], retrying transient failures with per-key exponential backoff.

mod config;
mod controller;
mod errors;
mod informer;
mod metrics;
mod notifier;
mod queue;
mod resource;
pub mod utils;

pub use config::*;
pub use controller::*;
pub use errors::*;
pub use informer::*;
pub use metrics::*;
pub use notifier::*;
pub use queue::*;
pub use resource::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
