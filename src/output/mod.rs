//! Plain-text rendering shared by the CLI commands.
//!
//! Human mode prints aligned tables; the follow/monitor loops emit one
//! pipe-delimited envelope line per event on the same stream as their
//! error lines, so log-based alerting needs no second channel.

use chrono::{DateTime, Utc};

/// UTC timestamp in the envelope format: second precision, `Z` suffix.
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Render an aligned text table. Column widths fit the widest cell.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no rows)".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(h, widths[i]))
        .collect();
    out.push_str(&header_line.join(" | "));
    out.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join("-+-"));
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| pad(cell, widths[i]))
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }

    // Drop the trailing newline so callers control spacing
    out.pop();
    out
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        let mut padded = text.to_string();
        padded.extend(std::iter::repeat(' ').take(width - len));
        padded
    }
}

/// `yes`/`no` rendering for table cells.
pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
