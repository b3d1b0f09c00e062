//! Outbound status message rendering.

use hostwatch_core::ReportBlock;

use crate::session::SessionKey;

/// Suffix appended when a rendered body exceeds the configured limit.
const TRUNCATION_NOTICE: &str = "\n...[message truncated]...";

/// Characters taken by the `\n<pre></pre>` wrapping around the body.
const PRE_WRAP_CHARS: usize = 12;

/// Render one report block as the HTML status message for `key`.
///
/// Bold header naming the host and metric, then the block text in a `<pre>`
/// section, escaped and truncated so the whole message fits `max_chars`.
pub(crate) fn render_block(key: &SessionKey, block: &ReportBlock, max_chars: usize) -> String {
    let header = format!("<b>🔔 [{}] {} monitor</b>", key.host, key.metric.label());
    let budget = max_chars.saturating_sub(header.chars().count() + PRE_WRAP_CHARS);
    let body = truncate_chars(&escape_html(&block.text()), budget);
    format!("{header}\n<pre>{body}</pre>")
}

/// Truncate to at most `max` characters, marking the cut.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(TRUNCATION_NOTICE.chars().count());
    let cut: String = s.chars().take(keep).collect();
    format!("{cut}{TRUNCATION_NOTICE}")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
