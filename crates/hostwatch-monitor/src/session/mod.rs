//! Session lifecycle management: registry, controller, and reader tasks.
//!
//! One session per (metric, user, host) key. The registry's atomic
//! check-and-insert enforces uniqueness, the controller opens and closes
//! channels, and each session's reader task streams report blocks to the
//! delivery sink. A session runs from successful registration until either a
//! stop request closes its channel or the remote command ends; either way the
//! reader's exit path releases the key and cleans up the last status message.

mod controller;
mod reader;
mod registry;
mod types;

pub use controller::SessionController;
pub use registry::SessionRegistry;
pub use types::{SessionKey, StartOutcome, StopOutcome};
