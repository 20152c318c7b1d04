//! Reconcile loop.
//!
//! Keys observed by the synchronizer are rate limited through the work queue and reconciled by a
//! fixed pool of workers: resolve the key against the cache, drop stale events, hand fresh ones to
//! the notifier. Transient failures are retried with per-key backoff; everything else is
//! forgotten.

#[allow(clippy::module_inception)]
mod controller;
mod staleness;

pub use controller::*;
pub use staleness::*;
