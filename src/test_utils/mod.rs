//! Shared helpers for the unit tests
mod common;
mod event_builder;

pub use common::*;
pub use event_builder::*;
