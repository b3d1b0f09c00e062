//! Session subsystem types.

use std::fmt;

use hostwatch_core::MetricKind;

/// Identity of one monitoring session: which metric, for whom, on which host.
///
/// Keys compare by value over all three fields and index the session registry
/// and delivery records. Because the metric arrives already parsed, a key can
/// never name an unknown collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Metric being collected.
    pub metric: MetricKind,
    /// User the session belongs to.
    pub user_id: i64,
    /// Configured name of the monitored host.
    pub host: String,
}

impl SessionKey {
    pub fn new(metric: MetricKind, user_id: i64, host: impl Into<String>) -> Self {
        Self {
            metric,
            user_id,
            host: host.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.metric, self.user_id, self.host)
    }
}

/// Outcome of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Session registered, channel open, reader running.
    Activated,
    /// A session with the same key is already running; nothing was done.
    AlreadyActive,
    /// Transport open or command start failed; the registration was rolled
    /// back and the key is free again.
    ConnectionError { detail: String },
    /// The request never reached the transport (e.g. unknown host).
    PreconditionFailed { reason: String },
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Channel closed and registry entry removed.
    Stopped,
    /// No session with that key was active.
    NotActive,
}
