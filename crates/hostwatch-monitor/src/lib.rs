//! hostwatch Session Subsystem
//!
//! Starts, tracks, and tears down remote monitoring sessions, relaying their
//! sentinel-delimited output to a messaging surface with at most one live
//! status message per (metric, user, host) key.
//!
//! The remote-shell transport and the chat backend are supplied by the
//! embedding application behind the [`transport::Transport`] and
//! [`messaging::Messenger`] traits; scripted doubles live in the `testing`
//! module (also available to downstream crates via the `test-utils` feature).

pub mod delivery;
pub mod messaging;
pub mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod transport;

pub use delivery::DeliverySink;
pub use session::{SessionController, SessionKey, SessionRegistry, StartOutcome, StopOutcome};
