//! Report block types shared by the assembler and the delivery layer.

/// Line emitted by collector scripts to terminate one report block.
pub const BLOCK_SENTINEL: &str = "===END_MONITOR_BLOCK===";

/// One snapshot of monitored data: the ordered lines accumulated since the
/// previous flush, including the terminating sentinel line when one was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    /// Lines in arrival order.
    pub lines: Vec<String>,
}

impl ReportBlock {
    /// Joined text as it appears in the status message body.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
