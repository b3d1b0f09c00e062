//! Incremental assembly of monitor output into sentinel-delimited blocks.

use super::types::{BLOCK_SENTINEL, ReportBlock};

/// Stateful line assembler fed with decoded output chunks.
///
/// Chunks may split lines at arbitrary positions; a trailing fragment is
/// carried until its newline arrives. A line equal to [`BLOCK_SENTINEL`]
/// completes the current block, with the sentinel included as its last line.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    lines: Vec<String>,
    partial: String,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded chunk, returning every block it completed.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<ReportBlock> {
        let mut completed = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.find('\n') {
            self.partial.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];

            let mut line = std::mem::take(&mut self.partial);
            if line.ends_with('\r') {
                line.pop();
            }
            let terminal = line == BLOCK_SENTINEL;
            self.lines.push(line);
            if terminal {
                completed.push(ReportBlock {
                    lines: std::mem::take(&mut self.lines),
                });
            }
        }
        self.partial.push_str(rest);

        completed
    }

    /// Flush whatever remains at end of stream (no trailing sentinel).
    pub fn finish(&mut self) -> Option<ReportBlock> {
        if !self.partial.is_empty() {
            let mut line = std::mem::take(&mut self.partial);
            if line.ends_with('\r') {
                line.pop();
            }
            self.lines.push(line);
        }
        if self.lines.is_empty() {
            None
        } else {
            Some(ReportBlock {
                lines: std::mem::take(&mut self.lines),
            })
        }
    }

    /// Number of buffered lines (including a partial fragment) not yet flushed.
    pub fn pending_lines(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }
}
