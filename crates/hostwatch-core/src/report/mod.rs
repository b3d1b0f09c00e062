//! Sentinel-delimited report block assembly for monitor script output.
//!
//! Collector scripts emit line-oriented text and terminate each snapshot with
//! a sentinel line. This module turns raw decoded output chunks into ordered
//! [`ReportBlock`]s, carrying partial lines across chunk boundaries.

mod assembler;
mod types;

pub use assembler::BlockAssembler;
pub use types::{BLOCK_SENTINEL, ReportBlock};
