//! Rate limited, deduplicating work queue of [`ResourceKey`](crate::ResourceKey)s.
//!
//! Semantics:
//! - a key is delivered to at most one worker at a time (in-flight between `get` and `done`);
//! - adding a key that is already waiting is a no-op, adding an in-flight key marks it dirty so it
//!   is redelivered once the current worker calls `done`;
//! - rate limited adds are delayed per key with exponential backoff until `forget` is called.

mod rate_limiter;
mod rate_limiting_queue;

pub use rate_limiter::*;
pub use rate_limiting_queue::*;

#[cfg(test)]
mod rate_limiter_test;
