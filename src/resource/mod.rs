mod resource_key;
mod watched_event;

pub use resource_key::*;
pub use watched_event::*;
