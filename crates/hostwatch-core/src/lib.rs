//! hostwatch Core Library
//!
//! Shared functionality for hostwatch components:
//! - Sentinel-delimited report block assembly for monitor script output
//! - Configuration resolution and hierarchy
//! - Metric kind identifiers for the built-in collector scripts
//! - Common error types

pub mod config;
pub mod error;
pub mod metric;
pub mod report;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use metric::MetricKind;
pub use report::{BLOCK_SENTINEL, BlockAssembler, ReportBlock};
