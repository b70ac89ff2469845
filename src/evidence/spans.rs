//! Source position utilities for citations
//!
//! This module converts byte offsets into line/column positions, cuts
//! anchor text around a span, and computes deterministic case IDs.
//!
//! # Design Decisions
//!
//! - **UTF-8 byte offsets in, character positions out**: offsets index the
//!   raw source bytes; columns and anchor windows count characters so Hangul
//!   text gets the same context as ASCII
//! - **Never panic on bad offsets**: offsets past the end or inside a
//!   character are clamped to the nearest valid boundary

use sha2::{Digest, Sha256};

/// Line and column position (1-indexed for editor compatibility)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

/// Largest char boundary at or before `offset`
fn floor_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Convert byte offset to line/column position
///
/// Line and column are 1-indexed for editor compatibility.
///
/// # Arguments
/// * `source` - The full source text
/// * `offset` - Byte offset to convert
///
/// # Returns
/// * `LineCol` with 1-indexed line and column
pub fn offset_to_line_col(source: &str, offset: usize) -> LineCol {
    let offset = floor_boundary(source, offset);
    let prefix = &source[..offset];

    let line = prefix.matches('\n').count() + 1;

    // Find the start of the current line
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);

    // Column is the number of characters (not bytes) from line start
    let col = source[line_start..offset].chars().count() + 1;

    LineCol { line, col }
}

/// Extract anchor text around a span
///
/// Returns about `window` characters of context centred on the span, with
/// line breaks flattened to spaces and "..." marking truncation.
///
/// # Arguments
/// * `source` - The full source text
/// * `start` - Start byte offset of span
/// * `end` - End byte offset of span
/// * `window` - Total characters of context (typically 80)
pub fn extract_anchor_text(source: &str, start: usize, end: usize, window: usize) -> String {
    let start = floor_boundary(source, start);
    let end = floor_boundary(source, end.max(start));

    let span_chars = source[start..end].chars().count();
    let each_side = window.saturating_sub(span_chars) / 2;

    // Walk back `each_side` characters
    let anchor_start = if each_side == 0 {
        start
    } else {
        source[..start]
            .char_indices()
            .rev()
            .nth(each_side - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };

    // Walk forward `each_side` characters
    let anchor_end = source[end..]
        .char_indices()
        .nth(each_side)
        .map(|(i, _)| end + i)
        .unwrap_or(source.len());

    let anchor: String = source[anchor_start..anchor_end]
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    // Add ellipsis if we truncated
    let prefix = if anchor_start > 0 { "..." } else { "" };
    let suffix = if anchor_end < source.len() { "..." } else { "" };

    format!("{}{}{}", prefix, anchor.trim(), suffix)
}

/// Compute a deterministic case ID
///
/// `case-` followed by the first 12 hex characters of
/// sha256(text + "\n" + contract_date). Identical inputs always produce the
/// same ID.
pub fn compute_case_id(text: &str, contract_date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"\n");
    hasher.update(contract_date.trim().as_bytes());

    let result = hasher.finalize();
    format!("case-{}", &hex::encode(&result[..6])) // 12 hex chars = 6 bytes
}
