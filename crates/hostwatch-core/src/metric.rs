//! Metric kind identifiers for the built-in collector scripts.
//!
//! A selector string arriving from the messaging surface is resolved here,
//! before any session or transport work: an unrecognized selector fails with
//! [`Error::UnknownMetric`] and never reaches the registry.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A metric collector available on monitored hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Ram,
    Cpu,
}

impl MetricKind {
    /// All built-in metric kinds.
    pub const ALL: [Self; 2] = [Self::Ram, Self::Cpu];

    /// Resolve a selector string, case-insensitively.
    pub fn parse(selector: &str) -> Result<Self> {
        match selector.trim().to_ascii_lowercase().as_str() {
            "ram" => Ok(Self::Ram),
            "cpu" => Ok(Self::Cpu),
            _ => Err(Error::UnknownMetric(selector.to_string())),
        }
    }

    /// Lower-case selector form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ram => "ram",
            Self::Cpu => "cpu",
        }
    }

    /// File name of the collector script on the remote host.
    pub const fn script_name(self) -> &'static str {
        match self {
            Self::Ram => "ram_monitor.sh",
            Self::Cpu => "cpu_monitor.sh",
        }
    }

    /// Upper-case label used in rendered status messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ram => "RAM",
            Self::Cpu => "CPU",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
