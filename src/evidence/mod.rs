//! Source citations for report evidence
//!
//! Every node a report cites can be traced back to the source text: the
//! byte offset recorded by the extractor becomes a line/column position and
//! a short anchor excerpt.
//!
//! # Design Principles
//!
//! - **Traceable**: a citation is only produced for a node that exists in
//!   the graph, and only when the source text is available
//! - **Deterministic**: the same input always yields the same citations and
//!   the same case ID

pub mod spans;
pub mod types;

pub use spans::{compute_case_id, extract_anchor_text, offset_to_line_col, LineCol};
pub use types::Citation;

use crate::core::graph::Node;

/// Characters of context in a citation anchor
pub const ANCHOR_WINDOW: usize = 80;

/// Cite `node` against the source text it was extracted from
pub fn cite(source: &str, node: &Node) -> Citation {
    let event = &node.event;
    let offset = event.raw.source_offset.min(source.len());
    let span_len = if event.raw.date.is_empty() {
        event.raw.diagnosis_raw.len()
    } else {
        event.raw.date.len()
    };
    let position = offset_to_line_col(source, offset);

    Citation {
        node_id: node.id.clone(),
        source_offset: event.raw.source_offset,
        line: position.line,
        column: position.col,
        anchor_text: extract_anchor_text(source, offset, offset + span_len, ANCHOR_WINDOW),
        merged_offsets: event.merged_offsets.clone(),
    }
}
