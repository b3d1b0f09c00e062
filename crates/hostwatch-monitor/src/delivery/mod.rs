//! Delivery of report blocks to the messaging surface.
//!
//! Keeps the single-live-message contract: every flush replaces the previous
//! status message for its key, and end-of-session cleanup removes the last
//! one, leaving nothing behind.

mod render;
mod sink;

pub use sink::DeliverySink;
