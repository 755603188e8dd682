//! Side-by-side HTML diff between two stored text versions.
//!
//! Input is bounded before diffing: lines longer than [`CHUNK_SIZE`]
//! characters are hard-split into chunks (minified pages are often a single
//! huge line) and at most [`MAX_DIFF_LINES`] lines per side are compared.
//! The output always contains [`TABLE_MARKER`], even for empty or identical
//! input.

use std::fmt::Write as _;
use std::ops::Range;
use std::time::Duration;

use similar::{Algorithm, DiffOp, DiffTag, TextDiff};
use unicode_segmentation::UnicodeSegmentation;

/// Maximum characters per compared line.
pub const CHUNK_SIZE: usize = 800;
/// Maximum compared lines per side.
pub const MAX_DIFF_LINES: usize = 4000;
/// Prefix every rendered diff starts with.
pub const TABLE_MARKER: &str = "<table class=\"diff\"";

const CONTEXT_LINES: usize = 2;
const DIFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Render a context-windowed side-by-side diff table.
pub fn render(previous: &str, current: &str) -> String {
    let prev_lines = prepare_lines(previous);
    let curr_lines = prepare_lines(current);
    let prev_refs: Vec<&str> = prev_lines.iter().map(String::as_str).collect();
    let curr_refs: Vec<&str> = curr_lines.iter().map(String::as_str).collect();

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_slices(&prev_refs, &curr_refs);
    let groups = diff.grouped_ops(CONTEXT_LINES);
    let has_changes = groups
        .iter()
        .flatten()
        .any(|op| op.tag() != DiffTag::Equal);

    let mut html = String::new();
    html.push_str(TABLE_MARKER);
    html.push_str(" summary=\"Previous vs Current\">\n");
    html.push_str(
        "<thead><tr><th class=\"diff_header\" colspan=\"2\">Previous</th>\
         <th class=\"diff_header\" colspan=\"2\">Current</th></tr></thead>\n<tbody>\n",
    );

    if !has_changes {
        html.push_str("<tr><td class=\"diff_none\" colspan=\"4\">No Differences Found</td></tr>\n");
    } else {
        for (index, group) in groups.iter().enumerate() {
            if index > 0 {
                html.push_str("<tr class=\"diff_sep\"><td colspan=\"4\">&hellip;</td></tr>\n");
            }
            for op in group {
                render_op(&mut html, op, &prev_refs, &curr_refs);
            }
        }
    }

    html.push_str("</tbody>\n</table>");
    html
}

/// Split text into bounded diff input lines.
fn prepare_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= CHUNK_SIZE {
            lines.push(line.to_string());
        } else {
            lines.extend(chunk_line(line, CHUNK_SIZE));
        }
    }

    if lines.len() > MAX_DIFF_LINES {
        let dropped = lines.len() - MAX_DIFF_LINES;
        lines.truncate(MAX_DIFF_LINES);
        lines.push(format!("[... truncated {dropped} more lines ...]"));
    }
    lines
}

/// Hard-split a line into chunks of at most `size` characters, never
/// cutting through a grapheme cluster.
fn chunk_line(line: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for grapheme in line.graphemes(true) {
        let width = grapheme.chars().count();
        if current_chars + width > size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(grapheme);
        current_chars += width;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn render_op(html: &mut String, op: &DiffOp, prev: &[&str], curr: &[&str]) {
    let (tag, old_range, new_range) = op.as_tag_tuple();
    match tag {
        DiffTag::Equal => {
            for (old, new) in old_range.zip(new_range) {
                push_row(
                    html,
                    Some((old, escape_html(prev[old]))),
                    Some((new, escape_html(curr[new]))),
                    "",
                );
            }
        }
        DiffTag::Delete => {
            for old in old_range {
                push_row(html, Some((old, escape_html(prev[old]))), None, "diff_sub");
            }
        }
        DiffTag::Insert => {
            for new in new_range {
                push_row(html, None, Some((new, escape_html(curr[new]))), "diff_add");
            }
        }
        DiffTag::Replace => render_replace(html, old_range, new_range, prev, curr),
    }
}

fn render_replace(
    html: &mut String,
    old_range: Range<usize>,
    new_range: Range<usize>,
    prev: &[&str],
    curr: &[&str],
) {
    let rows = old_range.len().max(new_range.len());
    for offset in 0..rows {
        let old = Some(old_range.start + offset).filter(|i| old_range.contains(i));
        let new = Some(new_range.start + offset).filter(|i| new_range.contains(i));
        match (old, new) {
            (Some(old), Some(new)) => {
                let (left, right) = inline_highlight(prev[old], curr[new]);
                push_row(html, Some((old, left)), Some((new, right)), "diff_chg");
            }
            (Some(old), None) => {
                push_row(html, Some((old, escape_html(prev[old]))), None, "diff_sub")
            }
            (None, Some(new)) => {
                push_row(html, None, Some((new, escape_html(curr[new]))), "diff_add")
            }
            (None, None) => {}
        }
    }
}

/// Character-level highlighting inside a changed line pair.
fn inline_highlight(old: &str, new: &str) -> (String, String) {
    let diff = TextDiff::configure()
        .timeout(DIFF_TIMEOUT)
        .diff_chars(old, new);
    let old_tokens = diff.old_slices();
    let new_tokens = diff.new_slices();

    let mut left = String::new();
    let mut right = String::new();
    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_text = escape_html(&old_tokens[old_range].concat());
        let new_text = escape_html(&new_tokens[new_range].concat());
        match tag {
            DiffTag::Equal => {
                left.push_str(&old_text);
                right.push_str(&new_text);
            }
            _ => {
                if !old_text.is_empty() {
                    let _ = write!(left, "<span class=\"diff_sub\">{old_text}</span>");
                }
                if !new_text.is_empty() {
                    let _ = write!(right, "<span class=\"diff_add\">{new_text}</span>");
                }
            }
        }
    }
    (left, right)
}

fn push_row(
    html: &mut String,
    left: Option<(usize, String)>,
    right: Option<(usize, String)>,
    class: &str,
) {
    html.push_str("<tr>");
    for side in [left, right] {
        match side {
            Some((index, text)) => {
                let _ = write!(
                    html,
                    "<td class=\"diff_header\">{}</td><td class=\"{}\">{}</td>",
                    index + 1,
                    class,
                    text
                );
            }
            None => html.push_str("<td class=\"diff_header\"></td><td></td>"),
        }
    }
    html.push_str("</tr>\n");
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
