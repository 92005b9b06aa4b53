//! Change request lifecycle: the state machine and notification fan-out.

pub mod engine;
pub mod fanout;

pub use engine::LifecycleEngine;
pub use fanout::{resolve_targets, FanOut, Notice, NotificationTarget};
