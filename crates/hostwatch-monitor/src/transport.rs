//! Transport contract for opening remote monitor channels.
//!
//! The embedding application supplies the real SSH implementation; the
//! session subsystem only depends on these capabilities, which keeps reader
//! tasks testable with scripted channels.

use std::time::Duration;

use async_trait::async_trait;

use hostwatch_core::config::HostEntry;

/// Errors from transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {host}: {reason}")]
    OpenFailed { host: String, reason: String },

    #[error("Failed to start remote command: {reason}")]
    ExecFailed { reason: String },

    #[error("Channel read failed: {reason}")]
    ReadFailed { reason: String },
}

/// Factory for authenticated connections to monitored hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `host`, giving up after `timeout`.
    async fn open(
        &self,
        host: &HostEntry,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An authenticated link to one host, consumed by starting a command.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Start `command` remotely, yielding the channel streaming its output.
    ///
    /// The channel owns whatever keeps the underlying link alive.
    async fn exec(self: Box<Self>, command: &str) -> Result<Box<dyn Channel>, TransportError>;
}

/// The output stream of a running remote command.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Whether output is pending right now.
    async fn poll_readable(&self) -> bool;

    /// Read up to `max_bytes` of whatever is available, without blocking.
    async fn read(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError>;

    /// Whether the remote command has terminated.
    async fn process_exited(&self) -> bool;

    /// Close the channel. Idempotent.
    async fn close(&self);
}
